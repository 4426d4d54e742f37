//! A small template engine for the dot-path, action-delimited grammar used
//! by parameterized SQL templates.
//!
//! Source text is literal output interleaved with `{{ ... }}` actions:
//! field references (`.User.Name`), pipelines (`.Cols | join ", "`),
//! conditionals, iteration, scoping, and named sub-templates
//! (`{{define "x"}}...{{end}}`, `{{template "x"}}`). Pipelines may call any
//! function registered in the [`FuncRegistry`] supplied at parse time.
//!
//! # Examples
//!
//! ```
//! use sqltmpl::template::{Template, sql_funcs};
//! use serde_json::json;
//!
//! let tmpl = Template::parse(
//!     "q",
//!     "SELECT {{.Cols | join \", \"}} FROM t",
//!     sql_funcs(),
//! ).unwrap();
//! let sql = tmpl.render(&json!({"Cols": ["id", "name"]})).unwrap();
//! assert_eq!(sql, "SELECT id, name FROM t");
//! ```

pub mod error;
pub mod funcs;
pub mod node;

mod lexer;
mod parser;
mod render;

use std::collections::BTreeMap;

use serde_json::Value;

pub use self::error::{ParseError, RenderError};
pub use self::funcs::{FuncRegistry, TemplateFn, sql_funcs};
pub use self::node::{Arg, Branch, Command, Inclusion, Node, Pipe};

/// An immutable compiled template: the primary body plus every named
/// sub-template defined in the same source.
///
/// A `Template` owns the function registry it was parsed against, so
/// rendering sees exactly the names the parser validated.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    root: Vec<Node>,
    subs: BTreeMap<String, Vec<Node>>,
    funcs: FuncRegistry,
}

impl Template {
    /// Compiles `source` under the given name, validating function
    /// references against `funcs`.
    pub fn parse(name: &str, source: &str, funcs: FuncRegistry) -> Result<Self, ParseError> {
        let parsed = parser::parse(name, source, &funcs)?;
        Ok(Template {
            name: name.to_string(),
            root: parsed.root,
            subs: parsed.subs,
            funcs,
        })
    }

    /// The name the primary template was compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The primary template body.
    pub fn root(&self) -> &[Node] {
        &self.root
    }

    /// Every named sub-template, in name order.
    pub fn sub_templates(&self) -> impl Iterator<Item = (&str, &[Node])> {
        self.subs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub(crate) fn sub_body(&self, name: &str) -> Option<&[Node]> {
        self.subs.get(name).map(Vec::as_slice)
    }

    pub(crate) fn funcs(&self) -> &FuncRegistry {
        &self.funcs
    }

    /// Executes the primary template against `context`.
    pub fn render(&self, context: &Value) -> Result<String, RenderError> {
        render::render(self, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exposes_sub_templates_in_name_order() {
        let tmpl = Template::parse(
            "t",
            r#"{{define "b"}}2{{end}}{{define "a"}}1{{end}}x"#,
            sql_funcs(),
        )
        .unwrap();
        let names: Vec<&str> = tmpl.sub_templates().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_syntax_error_carries_name_and_line() {
        let err = Template::parse("q", "ok\n{{if}}", sql_funcs()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("template: q:2:"), "got: {msg}");
    }

    #[test]
    fn test_render_uses_parse_time_registry() {
        let mut funcs = sql_funcs();
        funcs.insert("shout", |args: &[serde_json::Value]| {
            Ok(serde_json::Value::String(
                crate::template::funcs::display(&args[0]).to_uppercase() + "!",
            ))
        });
        let tmpl = Template::parse("t", r#"{{shout "go"}}"#, funcs).unwrap();
        assert_eq!(tmpl.render(&Value::Null).unwrap(), "GO!");
    }
}
