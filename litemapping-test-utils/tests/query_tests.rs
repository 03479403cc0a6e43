//! Query Tests
//!
//! Filtering, ordering and pagination through a real SQLite table, plus
//! cursor release on the read path.

use litemapping_core::{
    CompareOp, Condition, ConditionLink, QueryArgument, QueryError, TableIdentity,
};
use litemapping_storage::{InMemoryMetadataStore, LiteMapping, SqliteEngine};
use litemapping_test_utils::assertions::assert_unknown_column;
use litemapping_test_utils::fixtures::{in_memory, people_schema};
use litemapping_test_utils::mocks::FaultyEngine;
use litemapping_test_utils::{init_test_tracing, MappingError, Row, TypeRegistry, Value};

fn people() -> LiteMapping {
    let registry = TypeRegistry::new();
    let table = in_memory("query/people", people_schema(&registry));
    let rows: Vec<Row> = (0..10)
        .map(|i: i32| {
            Row::new()
                .with("name", format!("p{}", i))
                .with("age", 20 + i)
                .with("active", i % 2 == 0)
        })
        .collect();
    table.insert_all(&rows).unwrap();
    table
}

fn names(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|r| match r.get("name") {
            Some(Value::Text(s)) => s.clone(),
            other => panic!("unexpected name {:?}", other),
        })
        .collect()
}

#[test]
fn test_condition_filters() {
    let table = people();
    let rows = table
        .query(&QueryArgument::new().set_condition(Condition::ge("age", 27)))
        .unwrap();
    assert_eq!(names(&rows), vec!["p7", "p8", "p9"]);

    let rows = table
        .query(&QueryArgument::new().set_condition(Condition::eq("active", true)))
        .unwrap();
    assert_eq!(rows.len(), 5);
}

#[test]
fn test_and_or_links() {
    let table = people();
    let both = QueryArgument::new().set_conditions(
        vec![Condition::gt("age", 22), Condition::lt("age", 25)],
        ConditionLink::And,
    );
    assert_eq!(names(&table.query(&both).unwrap()), vec!["p3", "p4"]);

    let either = QueryArgument::new().set_conditions(
        vec![
            Condition::new("age", CompareOp::EqualTo, 20),
            Condition::eq("name", "p9"),
        ],
        ConditionLink::Or,
    );
    assert_eq!(names(&table.query(&either).unwrap()), vec!["p0", "p9"]);
}

#[test]
fn test_order_and_pages() {
    let table = people();
    let desc = QueryArgument::new().set_order_by_reverse("age", true);
    let page = desc.clone().set_page_and_size(1, 3);
    assert_eq!(names(&table.query(&page).unwrap()), vec!["p6", "p5", "p4"]);

    // Past the end is empty, not an error.
    let past = desc.clone().set_page_and_size(4, 3);
    assert!(table.query(&past).unwrap().is_empty());

    let capped = QueryArgument::new().set_order_by("name").set_page_size(2);
    assert_eq!(names(&table.query(&capped).unwrap()), vec!["p0", "p1"]);
}

#[test]
fn test_page_without_size_is_rejected() {
    let table = people();
    let argument = QueryArgument {
        page: Some(2),
        ..QueryArgument::new()
    };
    assert!(matches!(
        table.query(&argument),
        Err(MappingError::Query(QueryError::InvalidPagination { page: 2 }))
    ));
}

#[test]
fn test_unknown_columns_are_rejected_before_sql() {
    let table = people();
    assert_unknown_column(
        &table.query(&QueryArgument::new().set_condition(Condition::eq("nope", 1))),
        "nope",
    );
    assert_unknown_column(
        &table.query(&QueryArgument::new().set_order_by("nope")),
        "nope",
    );
}

#[test]
fn test_null_condition_matches_empty_text() {
    let registry = TypeRegistry::new();
    let table = in_memory("query/people", people_schema(&registry));
    table.insert(&Row::new().with("name", "")).unwrap();
    table.insert(&Row::new().with("age", 1)).unwrap();

    let rows = table
        .query(&QueryArgument::new().set_condition(Condition::eq("name", Value::Null)))
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::from("")));
}

#[test]
fn test_ids_and_lookup() {
    let table = people();
    let ids = table
        .query_id(&QueryArgument::new().set_condition(Condition::lt("age", 22)))
        .unwrap();
    assert_eq!(ids, vec![Value::Long(1), Value::Long(2)]);
    assert_eq!(table.query_all_ids().unwrap().len(), 10);

    assert!(table.contain(3i64).unwrap());
    assert!(!table.contain(42i64).unwrap());
    assert_eq!(table.query_by_id(42i64).unwrap(), None);

    let row = table.query_by_id(3i64).unwrap().unwrap();
    assert_eq!(row.get("_id"), Some(&Value::Long(3)));
    assert_eq!(row.get("age"), Some(&Value::Int(22)));
}

#[test]
fn test_cursor_close_failure_does_not_fail_the_read() {
    init_test_tracing();
    let registry = TypeRegistry::new();
    let table = LiteMapping::with_engine(
        TableIdentity::parse("query/people").unwrap(),
        people_schema(&registry),
        FaultyEngine::new(SqliteEngine::open_in_memory().unwrap()),
        &InMemoryMetadataStore::new(),
        1,
    )
    .unwrap();
    table.insert(&Row::new().with("name", "ada")).unwrap();

    let state = table.engine().state();
    state.fail_cursor_close(true);
    let before = state.cursor_closes();

    let rows = table.query_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(state.cursor_closes(), before + 1);
}

#[test]
fn test_migration_report_serializes() {
    let registry = TypeRegistry::new();
    let table = in_memory("query/people", people_schema(&registry));
    let json = serde_json::to_value(table.migration()).unwrap();
    assert_eq!(json["stored_version"], 0);
    assert_eq!(json["version"], 1);
    assert_eq!(json["transitions"], serde_json::json!(["Created", "Open"]));
    assert_eq!(json["statements"].as_array().map(Vec::len), Some(1));
}
