//! Property-Based Tests for Value Round-Trips
//!
//! For any row of well-typed values, inserting it and reading it back by key
//! yields the same logical values, and columns left out of the insert come
//! back as their declared defaults.

use litemapping_core::{Coercer, Decoded, RawCell, StorageValue};
use litemapping_test_utils::fixtures::{every_type_schema, in_memory, people_schema};
use litemapping_test_utils::generators::{arb_logical_type, arb_row, arb_table_path, arb_value};
use litemapping_test_utils::assertions::assert_rows_equivalent;
use litemapping_test_utils::{
    init_test_tracing, AppType, ColumnSpec, MappingConfig, Row, Schema, TypeRegistry, Value,
};
use proptest::prelude::*;

fn single_column_schema(registry: &TypeRegistry, app_type: AppType) -> Schema {
    let mut schema = Schema::builder::<i64>(registry, "id")
        .build()
        .expect("key only schema");
    schema
        .append(ColumnSpec::new("v", app_type))
        .expect("new column");
    schema
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_every_type_roundtrips_through_sqlite(row in arb_row(&every_type_schema(&TypeRegistry::new()))) {
        init_test_tracing();
        let registry = TypeRegistry::new();
        let table = in_memory("props/every_type", every_type_schema(&registry));

        prop_assert!(table.insert_by_id_with("k", &row).unwrap());
        let stored = table.query_by_id("k").unwrap().expect("row just inserted");

        prop_assert_eq!(stored.get("key"), Some(&Value::from("k")));
        assert_rows_equivalent(&stored, &row);
    }

    #[test]
    fn prop_people_rows_roundtrip(rows in prop::collection::vec(arb_row(&people_schema(&TypeRegistry::new())), 1..8)) {
        let registry = TypeRegistry::new();
        let table = in_memory("props/people", people_schema(&registry));

        let ids = table.insert_all(&rows).unwrap();
        prop_assert_eq!(ids.len(), rows.len());
        for (id, row) in ids.iter().zip(&rows) {
            let stored = table.query_by_id(*id).unwrap().expect("row just inserted");
            assert_rows_equivalent(&stored, row);
        }
    }

    #[test]
    fn prop_coercion_roundtrip_without_engine(
        (logical, value) in arb_logical_type().prop_flat_map(|l| (Just(l), arb_value(l)))
    ) {
        let registry = TypeRegistry::new();
        let schema = single_column_schema(&registry, AppType::primitive(logical));
        let coercer = Coercer::new(&schema);

        let cell: RawCell = coercer.to_storage_value("v", &value).unwrap().into();
        prop_assert_eq!(coercer.from_storage_value("v", &cell).unwrap(), Decoded::Value(value));
    }

    #[test]
    fn prop_valid_paths_parse(path in arb_table_path()) {
        let identity = MappingConfig::new(path.clone(), 1).validate().unwrap();
        prop_assert_eq!(format!("{}/{}", identity.database, identity.table), path);
    }
}

#[test]
fn test_defaults_for_omitted_columns() {
    let registry = TypeRegistry::new();
    let table = in_memory("plain/people", people_schema(&registry));

    let id = table.insert(&Row::new().with("name", "ada")).unwrap();
    let row = table.query_by_id(id).unwrap().unwrap();

    assert_eq!(row.get("age"), Some(&Value::Int(0)));
    assert_eq!(row.get("active"), Some(&Value::Boolean(false)));
    assert_eq!(row.get("score"), Some(&Value::Null));
    assert_eq!(row.get("initial"), Some(&Value::Null));
    assert_eq!(row.get("avatar"), Some(&Value::Null));
}

#[test]
fn test_numeric_narrowing_on_write() {
    let registry = TypeRegistry::new();
    let table = in_memory("plain/every_type", every_type_schema(&registry));

    let row = Row::new()
        .with("byte_col", 300i32)
        .with("short_col", 70000i64)
        .with("int_col", 12.9f64)
        .with("string_col", 42i32)
        .with("bool_col", "TRUE");
    assert!(table.insert_by_id_with("n", &row).unwrap());

    let stored = table.query_by_id("n").unwrap().unwrap();
    assert_eq!(stored.get("byte_col"), Some(&Value::Byte(300i32 as i8)));
    assert_eq!(stored.get("short_col"), Some(&Value::Short(70000i64 as i16)));
    assert_eq!(stored.get("int_col"), Some(&Value::Int(12)));
    assert_eq!(stored.get("string_col"), Some(&Value::from("42")));
    assert_eq!(stored.get("bool_col"), Some(&Value::Boolean(true)));
}

#[test]
fn test_storage_value_widths() {
    let registry = TypeRegistry::new();
    let schema = every_type_schema(&registry);
    let coercer = Coercer::new(&schema);

    assert_eq!(
        coercer.to_storage_value("byte_col", &Value::Byte(-3)).unwrap(),
        StorageValue::Int32(-3)
    );
    assert_eq!(
        coercer.to_storage_value("long_col", &Value::Int(5)).unwrap(),
        StorageValue::Int64(5)
    );
    assert_eq!(
        coercer.to_storage_value("float_col", &Value::Double(0.5)).unwrap(),
        StorageValue::Real32(0.5)
    );
}

#[test]
fn test_empty_blob_survives_sqlite() {
    let registry = TypeRegistry::new();
    let table = in_memory("plain/people", people_schema(&registry));

    let id = table
        .insert(&Row::new().with("avatar", Vec::<u8>::new()))
        .unwrap();
    let row = table.query_by_id(id).unwrap().unwrap();
    assert_eq!(row.get("avatar"), Some(&Value::Blob(Vec::new())));
}
