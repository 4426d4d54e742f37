//! End-to-end coverage of template variable extraction.

use sqltmpl::{Traversal, extract_template_vars, extract_template_vars_with};

#[test]
fn test_template_without_references_yields_empty_result() {
    let vars = extract_template_vars("SELECT 1 FROM dual").unwrap();
    assert!(vars.is_empty());

    let vars = extract_template_vars("").unwrap();
    assert!(vars.is_empty());
}

#[test]
fn test_duplicates_removed_and_result_sorted() {
    let vars = extract_template_vars("{{.A}}{{.B}}{{.A}}").unwrap();
    assert_eq!(vars, vec!["A", "B"]);
}

#[test]
fn test_sub_template_names_excluded() {
    let vars =
        extract_template_vars(r#"{{define "sub"}}{{.X}}{{end}}{{template "sub"}}"#).unwrap();
    assert_eq!(vars, vec!["X"]);
    assert!(!vars.contains(&"sub".to_string()));
}

// The default traversal does not walk the body of an if block; only the
// guard expression contributes. Callers snapshot this output shape.
#[test]
fn test_if_body_variables_not_collected() {
    let vars = extract_template_vars("{{if .Cond}}{{.Y}}{{end}}").unwrap();
    assert_eq!(vars, vec!["Cond"]);
}

#[test]
fn test_deep_mode_is_the_explicit_opt_in() {
    let vars =
        extract_template_vars_with("{{if .Cond}}{{.Y}}{{end}}", Traversal::Deep).unwrap();
    assert_eq!(vars, vec!["Cond", "Y"]);
}

#[test]
fn test_realistic_query_template() {
    let src = r#"
SELECT {{.Cols | join ", "}}
FROM {{.Table}}
WHERE created_at >= {{.Since | quote}}
{{if .Limit}}LIMIT {{.Limit}}{{end}}
{{define "tail"}}ORDER BY {{.OrderCol}}{{end}}
{{template "tail"}}"#;
    let vars = extract_template_vars(src).unwrap();
    // OrderCol sits inside a define body, which the walker does visit.
    assert_eq!(vars, vec!["Cols", "Limit", "OrderCol", "Since", "Table"]);
}

#[test]
fn test_extraction_is_deterministic_across_runs() {
    let src = r#"{{.Zeta}}{{.Alpha}}{{if .Mid}}x{{end}}{{template "ghost"}}"#;
    let first = extract_template_vars(src).unwrap();
    for _ in 0..3 {
        assert_eq!(extract_template_vars(src).unwrap(), first);
    }
    assert_eq!(first, vec!["Alpha", "Mid", "Zeta", "ghost"]);
}

#[test]
fn test_parse_errors_carry_position() {
    let err = extract_template_vars("ok line\n{{unknownfn .X}}").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains(":2:"), "expected line in {msg}");
    assert!(msg.contains("unknownfn"));
}
