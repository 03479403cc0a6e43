//! LiteMapping Test Utilities
//!
//! Shared test infrastructure for the LiteMapping workspace:
//! - Proptest generators for values and rows
//! - A fault-injecting engine
//! - Fixtures for schemas and on-disk databases
//! - Assertions on mapping errors

pub use litemapping_core::{
    AppType, BatchError, BatchResult, ColumnSpec, Condition, LogicalType, MappingConfig,
    MappingError, MappingResult, QueryArgument, Row, Schema, StorageError, TypeError,
    TypeRegistry, Value,
};
pub use litemapping_storage::{InMemoryMetadataStore, LiteMapping, SqliteEngine};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `warn`. Repeated calls are ignored.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK ENGINE
// ============================================================================

pub mod mocks {
    //! Engine wrappers that fail on demand.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use litemapping_core::{MappingError, MappingResult, RawCell, Selection, StorageError, StorageValue};
    use litemapping_storage::{QueryRequest, RowCursor, SqlEngine};

    fn injected(what: &str) -> MappingError {
        StorageError::EngineFailure {
            reason: format!("injected {} failure", what),
        }
        .into()
    }

    /// Counters shared between a [`FaultyEngine`] and the test holding it.
    #[derive(Debug, Default)]
    pub struct FaultState {
        inserts: AtomicUsize,
        fail_insert_at: AtomicUsize,
        fail_commit: AtomicBool,
        fail_cursor_close: AtomicBool,
        rollbacks: AtomicUsize,
        cursor_closes: AtomicUsize,
    }

    impl FaultState {
        /// Fail the `n`-th insert (zero-based, counted from now on).
        pub fn fail_insert_at(&self, n: usize) {
            self.inserts.store(0, Ordering::SeqCst);
            self.fail_insert_at.store(n + 1, Ordering::SeqCst);
        }

        pub fn fail_commit(&self, fail: bool) {
            self.fail_commit.store(fail, Ordering::SeqCst);
        }

        pub fn fail_cursor_close(&self, fail: bool) {
            self.fail_cursor_close.store(fail, Ordering::SeqCst);
        }

        pub fn rollbacks(&self) -> usize {
            self.rollbacks.load(Ordering::SeqCst)
        }

        pub fn cursor_closes(&self) -> usize {
            self.cursor_closes.load(Ordering::SeqCst)
        }
    }

    /// Delegates to an inner engine, injecting failures configured through
    /// its [`FaultState`].
    pub struct FaultyEngine<E> {
        inner: E,
        state: Arc<FaultState>,
    }

    impl<E: SqlEngine> FaultyEngine<E> {
        pub fn new(inner: E) -> Self {
            Self {
                inner,
                state: Arc::new(FaultState::default()),
            }
        }

        pub fn state(&self) -> Arc<FaultState> {
            self.state.clone()
        }

        pub fn inner(&self) -> &E {
            &self.inner
        }
    }

    impl<E: SqlEngine> SqlEngine for FaultyEngine<E> {
        fn execute(&self, sql: &str) -> MappingResult<()> {
            self.inner.execute(sql)
        }

        fn insert(&self, table: &str, values: &[(String, StorageValue)]) -> MappingResult<i64> {
            let seen = self.state.inserts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.state.fail_insert_at.load(Ordering::SeqCst) == seen {
                return Err(injected("insert"));
            }
            self.inner.insert(table, values)
        }

        fn update(
            &self,
            table: &str,
            values: &[(String, StorageValue)],
            selection: &Selection,
        ) -> MappingResult<usize> {
            self.inner.update(table, values, selection)
        }

        fn delete(&self, table: &str, selection: &Selection) -> MappingResult<usize> {
            self.inner.delete(table, selection)
        }

        fn query(&self, request: &QueryRequest) -> MappingResult<Box<dyn RowCursor>> {
            let cursor = self.inner.query(request)?;
            Ok(Box::new(TrackedCursor {
                inner: cursor,
                state: self.state.clone(),
            }))
        }

        fn begin_transaction(&self) -> MappingResult<()> {
            self.inner.begin_transaction()
        }

        fn commit_transaction(&self) -> MappingResult<()> {
            if self.state.fail_commit.load(Ordering::SeqCst) {
                return Err(injected("commit"));
            }
            self.inner.commit_transaction()
        }

        fn rollback_transaction(&self) -> MappingResult<()> {
            self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
            self.inner.rollback_transaction()
        }

        fn schema_version(&self) -> MappingResult<u32> {
            self.inner.schema_version()
        }

        fn set_schema_version(&self, version: u32) -> MappingResult<()> {
            self.inner.set_schema_version(version)
        }
    }

    struct TrackedCursor {
        inner: Box<dyn RowCursor>,
        state: Arc<FaultState>,
    }

    impl RowCursor for TrackedCursor {
        fn count(&self) -> usize {
            self.inner.count()
        }

        fn column_count(&self) -> usize {
            self.inner.column_count()
        }

        fn column_name(&self, index: usize) -> Option<&str> {
            self.inner.column_name(index)
        }

        fn move_to_next(&mut self) -> bool {
            self.inner.move_to_next()
        }

        fn cell(&self, index: usize) -> MappingResult<RawCell> {
            self.inner.cell(index)
        }

        fn close(&mut self) -> MappingResult<()> {
            self.state.cursor_closes.fetch_add(1, Ordering::SeqCst);
            self.inner.close()?;
            if self.state.fail_cursor_close.load(Ordering::SeqCst) {
                return Err(injected("cursor close"));
            }
            Ok(())
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for values that survive a trip through SQLite.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_logical_type() -> impl Strategy<Value = LogicalType> {
        proptest::sample::select(LogicalType::ALL.to_vec())
    }

    /// Non-null values of `logical`.
    ///
    /// Reals are finite (SQLite stores NaN as NULL) and text avoids NUL.
    pub fn arb_value(logical: LogicalType) -> BoxedStrategy<Value> {
        match logical {
            LogicalType::Byte => any::<i8>().prop_map(Value::Byte).boxed(),
            LogicalType::Short => any::<i16>().prop_map(Value::Short).boxed(),
            LogicalType::Int => any::<i32>().prop_map(Value::Int).boxed(),
            LogicalType::Long => any::<i64>().prop_map(Value::Long).boxed(),
            LogicalType::Float => any::<f32>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::Float)
                .boxed(),
            LogicalType::Double => any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(Value::Double)
                .boxed(),
            LogicalType::Boolean => any::<bool>().prop_map(Value::Boolean).boxed(),
            LogicalType::Char => any::<char>()
                .prop_filter("not NUL", |c| *c != '\0')
                .prop_map(Value::Char)
                .boxed(),
            LogicalType::String => "[^\\x00]{0,32}".prop_map(Value::Text).boxed(),
            LogicalType::Blob => prop::collection::vec(any::<u8>(), 0..64)
                .prop_map(Value::Blob)
                .boxed(),
        }
    }

    /// Values a column of `app_type` accepts; boxed columns also get NULL.
    pub fn arb_value_for(app_type: AppType) -> BoxedStrategy<Value> {
        if app_type.boxed {
            prop_oneof![1 => Just(Value::Null), 4 => arb_value(app_type.logical)].boxed()
        } else {
            arb_value(app_type.logical)
        }
    }

    /// A row filling every data column of `schema`.
    pub fn arb_row(schema: &Schema) -> impl Strategy<Value = Row> {
        let columns: Vec<(String, BoxedStrategy<Value>)> = schema
            .data_columns()
            .iter()
            .map(|c| (c.name.clone(), arb_value_for(c.app_type)))
            .collect();
        let names: Vec<String> = columns.iter().map(|(n, _)| n.clone()).collect();
        let strategies: Vec<BoxedStrategy<Value>> = columns.into_iter().map(|(_, s)| s).collect();
        strategies.prop_map(move |values| names.iter().cloned().zip(values).collect())
    }

    /// Valid `"<database>/<table>"` paths.
    pub fn arb_table_path() -> impl Strategy<Value = String> {
        ("[a-z_][a-z0-9_]{0,11}", "[a-z_][a-z0-9_]{0,11}")
            .prop_map(|(db, table)| format!("{}/{}", db, table))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built schemas and databases.

    use super::*;
    use litemapping_storage::LmdbMetadataStore;
    use tempfile::TempDir;

    /// Autoincrement key plus one column of several families.
    pub fn people_schema(registry: &TypeRegistry) -> Schema {
        Schema::auto_builder(registry, "_id")
            .column::<String>("name")
            .column::<i32>("age")
            .column::<Option<f64>>("score")
            .column::<bool>("active")
            .column::<char>("initial")
            .column::<Option<Vec<u8>>>("avatar")
            .build()
            .expect("people schema is valid")
    }

    /// `people_schema` plus two later columns, as a version 2 would declare.
    pub fn people_schema_v2(registry: &TypeRegistry) -> Schema {
        let mut schema = people_schema(registry);
        schema
            .append(ColumnSpec::new("email", AppType::boxed(LogicalType::String)))
            .expect("email is new");
        schema
            .append(ColumnSpec::new("visits", AppType::primitive(LogicalType::Long)))
            .expect("visits is new");
        schema
    }

    /// Text key and one data column per logical type.
    pub fn every_type_schema(registry: &TypeRegistry) -> Schema {
        Schema::builder::<String>(registry, "key")
            .column::<i8>("byte_col")
            .column::<i16>("short_col")
            .column::<i32>("int_col")
            .column::<i64>("long_col")
            .column::<f32>("float_col")
            .column::<f64>("double_col")
            .column::<bool>("bool_col")
            .column::<char>("char_col")
            .column::<String>("string_col")
            .column::<Vec<u8>>("blob_col")
            .build()
            .expect("every-type schema is valid")
    }

    /// A temporary data directory that is removed on drop.
    pub struct TestDatabase {
        dir: TempDir,
        path: String,
    }

    impl TestDatabase {
        pub fn new(path: impl Into<String>) -> Self {
            Self {
                dir: TempDir::new().expect("temp dir"),
                path: path.into(),
            }
        }

        pub fn config(&self, version: u32) -> MappingConfig {
            MappingConfig::new(self.path.clone(), version).with_data_dir(self.dir.path())
        }

        /// Open the table at `version` with the LMDB metadata store.
        pub fn open(&self, schema: Schema, version: u32) -> MappingResult<LiteMapping> {
            LiteMapping::open_with_lmdb(&self.config(version), schema)
        }

        /// Open the metadata store the handles use.
        pub fn metadata(&self) -> LmdbMetadataStore {
            let config = self.config(1);
            LmdbMetadataStore::new(config.metadata_dir(), config.metadata_map_size_mb)
                .expect("metadata store")
        }

        pub fn data_dir(&self) -> &std::path::Path {
            self.dir.path()
        }
    }

    /// In-memory table for tests that do not care about files.
    pub fn in_memory(path: &str, schema: Schema) -> LiteMapping {
        let identity = litemapping_core::TableIdentity::parse(path).expect("valid path");
        let engine = SqliteEngine::open_in_memory().expect("in-memory sqlite");
        LiteMapping::with_engine(identity, schema, engine, &InMemoryMetadataStore::new(), 1)
            .expect("fresh table")
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on mapping errors.

    use super::*;

    #[track_caller]
    pub fn assert_constraint_violation<T: std::fmt::Debug>(result: &MappingResult<T>) {
        match result {
            Err(MappingError::Storage(StorageError::ConstraintViolation { .. })) => {}
            other => panic!("Expected ConstraintViolation, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_type_mismatch<T: std::fmt::Debug>(result: &MappingResult<T>, column: &str) {
        match result {
            Err(MappingError::Type(TypeError::TypeMismatch { column: c, .. })) => {
                assert_eq!(c, column, "Wrong column in TypeMismatch");
            }
            other => panic!("Expected TypeMismatch on {}, got: {:?}", column, other),
        }
    }

    #[track_caller]
    pub fn assert_unknown_column<T: std::fmt::Debug>(result: &MappingResult<T>, column: &str) {
        match result {
            Err(MappingError::Type(TypeError::UnknownColumn { column: c })) => {
                assert_eq!(c, column, "Wrong column in UnknownColumn");
            }
            other => panic!("Expected UnknownColumn {}, got: {:?}", column, other),
        }
    }

    /// Assert a batch failed on item `index`.
    #[track_caller]
    pub fn assert_batch_failed_at<T: std::fmt::Debug>(result: &BatchResult<T>, index: usize) -> MappingError {
        match result {
            Err(BatchError {
                index: Some(i),
                cause,
            }) => {
                assert_eq!(*i, index, "Batch failed on the wrong item: {}", cause);
                cause.clone()
            }
            other => panic!("Expected batch failure at {}, got: {:?}", index, other),
        }
    }

    /// Compare two rows, treating reals with a relative tolerance.
    #[track_caller]
    pub fn assert_rows_equivalent(actual: &Row, expected: &Row) {
        for (column, want) in expected.iter() {
            let got = actual
                .get(column)
                .unwrap_or_else(|| panic!("Column {} missing from {:?}", column, actual));
            match (got, want) {
                (Value::Double(a), Value::Double(b)) => {
                    assert!(
                        (a - b).abs() <= b.abs() * 1e-12,
                        "Column {}: {} != {}",
                        column,
                        a,
                        b
                    );
                }
                _ => assert_eq!(got, want, "Column {}", column),
            }
        }
    }
}
