//! Alias extraction over the projection model.
//!
//! A projection entry is a tagged union over plain columns, computed
//! expressions, and case-when expressions. These helpers read the
//! alias-bearing field out of whichever variant is active, producing output
//! positionally aligned with the input so the caller can zip the two.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alias: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expression {
    #[serde(default)]
    pub expr: String,
    /// The name the expression result is selected as.
    #[serde(default)]
    pub call_as: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseWhen {
    #[serde(default)]
    pub alias: String,
}

/// The active variant of a projection entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mix {
    Column(Column),
    Expression(Expression),
    CaseWhen(CaseWhen),
}

/// One projection entry. `mix` is unset when the wire message carried no
/// variant; such entries still occupy a position in alias output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MixField {
    pub mix: Option<Mix>,
}

/// One ORDER BY entry: the projection it depends on plus the direction
/// keyword (`ASC` / `DESC`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub dependent: Option<MixField>,
    pub order: String,
}

impl MixField {
    /// The alias-bearing field of the active variant, or `""` when unset.
    pub fn alias(&self) -> &str {
        match &self.mix {
            Some(Mix::Column(c)) => &c.alias,
            Some(Mix::Expression(e)) => &e.call_as,
            Some(Mix::CaseWhen(c)) => &c.alias,
            None => "",
        }
    }
}

/// SELECT aliases, one per entry, positionally aligned with the input.
pub fn select_aliases(fields: &[MixField]) -> Vec<String> {
    fields.iter().map(|f| f.alias().to_string()).collect()
}

/// ORDER BY aliases: the dependent entry's alias, a single space, then the
/// direction keyword.
pub fn order_aliases(orders: &[OrderBy]) -> Vec<String> {
    orders
        .iter()
        .map(|o| {
            let alias = o.dependent.as_ref().map(MixField::alias).unwrap_or("");
            format!("{} {}", alias, o.order)
        })
        .collect()
}
