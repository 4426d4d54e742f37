//! Free-variable extraction from parameterized templates.
//!
//! Given template source, reports every context variable the template
//! references, so a caller knows which named inputs must be supplied before
//! rendering. Sub-template names are discovered first and excluded from the
//! result; the remainder is deduplicated and sorted, so the output is stable
//! enough to diff or use as a cache key.
//!
//! # Examples
//!
//! ```
//! use sqltmpl::extract_template_vars;
//!
//! let vars = extract_template_vars("{{.B}} = {{.A}} AND {{.B}}").unwrap();
//! assert_eq!(vars, vec!["A", "B"]);
//! ```

use std::collections::{BTreeSet, HashSet};

use log::debug;

use crate::template::funcs::sql_funcs;
use crate::template::{Arg, Node, ParseError, Pipe, Template};

/// How deeply the walker looks inside control constructs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Traversal {
    /// Collect only the guard pipeline of if/with/range blocks and only the
    /// name of a template inclusion. This is the default and the shape
    /// existing callers snapshot against.
    #[default]
    GuardOnly,
    /// Also recurse into block bodies, else branches, and inclusion
    /// arguments.
    Deep,
}

/// Extracts the sorted, deduplicated set of free variable names referenced
/// by `text`, using the default [`Traversal::GuardOnly`] walk and the
/// [`sql_funcs`] registry.
///
/// An inclusion of a template that is never defined surfaces its name as an
/// ordinary variable, since only known sub-template names are excluded.
pub fn extract_template_vars(text: &str) -> Result<Vec<String>, ParseError> {
    extract_template_vars_with(text, Traversal::GuardOnly)
}

/// [`extract_template_vars`] with an explicit traversal mode.
pub fn extract_template_vars_with(
    text: &str,
    mode: Traversal,
) -> Result<Vec<String>, ParseError> {
    let tmpl = Template::parse("temp", text, sql_funcs())?;
    let names = template_names(&tmpl);
    let vars = collect_vars(&tmpl, mode);
    debug!(
        "collected {} raw identifiers against {} template names",
        vars.len(),
        names.len()
    );
    let mut kept: Vec<String> = vars.into_iter().filter(|v| !names.contains(v)).collect();
    kept.sort();
    Ok(kept)
}

/// The set of every name a template is registered under: the primary
/// template's own name plus every `define`d sub-template.
pub fn template_names(tmpl: &Template) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    names.insert(tmpl.name().to_string());
    for (name, _) in tmpl.sub_templates() {
        names.insert(name.to_string());
    }
    names
}

/// Raw identifier references from the primary body and from every named
/// sub-template, deduplicated in first-seen order. Includes the names used
/// by template inclusions; callers filter those against [`template_names`].
pub fn collect_vars(tmpl: &Template, mode: Traversal) -> Vec<String> {
    let mut vars = Vec::new();
    for node in tmpl.root() {
        node_vars(node, mode, &mut vars);
    }
    for (_, body) in tmpl.sub_templates() {
        for node in body {
            node_vars(node, mode, &mut vars);
        }
    }
    unique(vars)
}

fn node_vars(node: &Node, mode: Traversal, out: &mut Vec<String>) {
    match node {
        Node::Action(pipe) => pipe_vars(pipe, out),
        Node::If(b) | Node::With(b) | Node::Range(b) => {
            // Guard-only on purpose: identifiers referenced inside the block
            // body are not collected, only the guard pipeline. Suspect, but
            // downstream callers snapshot this exact shape, so the default
            // must not change. Traversal::Deep is the recursing variant.
            pipe_vars(&b.pipe, out);
            if mode == Traversal::Deep {
                for n in &b.body {
                    node_vars(n, mode, out);
                }
                if let Some(else_body) = &b.else_body {
                    for n in else_body {
                        node_vars(n, mode, out);
                    }
                }
            }
        }
        Node::Include(inc) => {
            // Recorded literally; the filter step drops it when it matches a
            // defined sub-template and leaves it to surface otherwise.
            out.push(inc.name.clone());
            if mode == Traversal::Deep {
                if let Some(pipe) = &inc.pipe {
                    pipe_vars(pipe, out);
                }
            }
        }
        // Text and comments reference nothing.
        Node::Text(_) | Node::Comment(_) => {}
    }
}

fn pipe_vars(pipe: &Pipe, out: &mut Vec<String>) {
    for cmd in &pipe.cmds {
        for arg in &cmd.args {
            match arg {
                Arg::Field(path) => out.push(path[0].clone()),
                Arg::Pipe(nested) => pipe_vars(nested, out),
                // Declared variables, literals, and function names are not
                // context inputs.
                _ => {}
            }
        }
    }
}

fn unique(vars: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut result = Vec::with_capacity(vars.len());
    for v in vars {
        if seen.insert(v.clone()) {
            result.push(v);
        }
    }
    result
}
