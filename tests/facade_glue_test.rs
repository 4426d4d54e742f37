//! Coverage of the glue around extraction: header decoding, dialect
//! resolution, and projection alias reading.

use serde_json::json;
use sqltmpl::dialect::{Dialect, Driver, dialect};
use sqltmpl::header::{HeaderError, extract_table_specs};
use sqltmpl::projection::{Column, Mix, MixField, OrderBy, order_aliases, select_aliases};

#[test]
fn test_table_specs_from_templated_json() {
    let text = r#"[
        {"database": {{printf "%q" "ods"}}, "table": "orders", "alias": "o"},
        {"table": "order_items", "alias": "i"}
    ]"#;
    let header = extract_table_specs(text).unwrap();
    let tables: Vec<&str> = header.specs.iter().map(|s| s.table.as_str()).collect();
    assert_eq!(tables, vec!["orders", "order_items"]);
    assert_eq!(header.specs[0].database, "ods");
}

#[test]
fn test_table_specs_with_conditional_sections() {
    let text = r#"[{"table": "base"}{{if false}},{"table": "never"}{{end}}]"#;
    let header = extract_table_specs(text).unwrap();
    assert_eq!(header.specs.len(), 1);
    assert_eq!(header.specs[0].table, "base");
}

#[test]
fn test_header_error_stages_are_distinct() {
    assert!(matches!(
        extract_table_specs("{{template}}").unwrap_err(),
        HeaderError::Parse(_)
    ));
    assert!(matches!(
        extract_table_specs(r#"[{"table": "{{.External}}"}]"#).unwrap_err(),
        HeaderError::Render(_)
    ));
    assert!(matches!(
        extract_table_specs("SELECT not-json").unwrap_err(),
        HeaderError::Decode(_)
    ));
}

#[test]
fn test_doris_builds_identical_sql_to_mysql() {
    let build = |d: Dialect| {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            d.quote("name"),
            d.quote("users"),
            d.quote("id"),
            d.placeholder(1)
        )
    };
    assert_eq!(build(dialect(Driver::Doris)), build(dialect(Driver::Mysql)));
    assert_ne!(
        build(dialect(Driver::Postgres)),
        build(dialect(Driver::Mysql))
    );
}

#[test]
#[should_panic(expected = "no SQL dialect mapped")]
fn test_unvalidated_driver_is_fatal() {
    dialect(Driver::Unspecified);
}

#[test]
fn test_select_and_order_aliases_align() {
    let fields: Vec<MixField> = serde_json::from_value(json!([
        {"mix": {"column": {"name": "id", "alias": "user_id"}}},
        {"mix": {"expression": {"expr": "count(*)", "call_as": "total"}}},
        {"mix": null},
        {"mix": {"case_when": {"alias": "tier"}}}
    ]))
    .unwrap();
    assert_eq!(
        select_aliases(&fields),
        vec!["user_id", "total", "", "tier"]
    );

    let orders = vec![
        OrderBy {
            dependent: Some(MixField {
                mix: Some(Mix::Column(Column {
                    name: "name".to_string(),
                    alias: "name".to_string(),
                })),
            }),
            order: "ASC".to_string(),
        },
        OrderBy {
            dependent: Some(MixField { mix: None }),
            order: "DESC".to_string(),
        },
    ];
    assert_eq!(order_aliases(&orders), vec!["name ASC", " DESC"]);
}
