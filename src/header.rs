//! Rendering-based extraction of physical table specifications.
//!
//! Some query templates carry an "addition" companion template that, when
//! rendered with no external variables, produces a JSON array describing the
//! physical tables the query touches. This module compiles that template,
//! executes it against the empty context, and decodes the output.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::template::funcs::sql_funcs;
use crate::template::{ParseError, RenderError, Template};

/// One physical table referenced by a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    #[serde(default)]
    pub database: String,
    pub table: String,
    #[serde(default)]
    pub alias: String,
}

/// The decoded header of a native SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeSqlHeader {
    pub specs: Vec<Specification>,
}

/// Failure of the render-and-decode pipeline; each stage is distinct so a
/// caller can tell a malformed template from malformed rendered output.
#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("invalid specification template: {0}")]
    Parse(#[from] ParseError),

    #[error("failed to render specification template: {0}")]
    Render(#[from] RenderError),

    #[error("rendered output is not a specification array: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Compiles `text` with the [`sql_funcs`] registry, renders it against the
/// empty context, and decodes the output as a JSON array of
/// [`Specification`] records.
///
/// The template must not reference external variables; a field reference
/// against the empty context is a [`HeaderError::Render`].
pub fn extract_table_specs(text: &str) -> Result<NativeSqlHeader, HeaderError> {
    let tmpl = Template::parse("addition", text, sql_funcs())?;
    let rendered = tmpl.render(&Value::Null)?;
    debug!("rendered {} bytes of specification output", rendered.len());
    let specs: Vec<Specification> = serde_json::from_str(&rendered)?;
    Ok(NativeSqlHeader { specs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_rendered_array() {
        let text = r#"[
            {"database": "ods", "table": "orders", "alias": "o"},
            {"table": "users"}
        ]"#;
        let header = extract_table_specs(text).unwrap();
        assert_eq!(header.specs.len(), 2);
        assert_eq!(header.specs[0].alias, "o");
        assert_eq!(header.specs[1].database, "");
        assert_eq!(header.specs[1].table, "users");
    }

    #[test]
    fn test_template_constructs_run_before_decoding() {
        let text = r#"[{{if true}}{"table": "t1"}{{end}}]"#;
        let header = extract_table_specs(text).unwrap();
        assert_eq!(header.specs[0].table, "t1");
    }

    #[test]
    fn test_each_stage_has_a_distinct_error() {
        let parse = extract_table_specs("{{if}}").unwrap_err();
        assert!(matches!(parse, HeaderError::Parse(_)));

        let render = extract_table_specs(r#"[{"table": "{{.T}}"}]"#).unwrap_err();
        assert!(matches!(render, HeaderError::Render(_)));

        let decode = extract_table_specs("not json").unwrap_err();
        assert!(matches!(decode, HeaderError::Decode(_)));
    }
}
