//! The table handle.

use litemapping_core::{
    BatchResult, Coercer, MappingConfig, MappingResult, QueryArgument, Row, Schema, Selection,
    TableIdentity, Value,
};

use crate::engine::{QueryRequest, ScopedCursor, SqlEngine};
use crate::marshal::{ids_from_cursor, rows_from_cursor};
use crate::metadata::{LmdbMetadataStore, MetadataStore};
use crate::migration::{AdditiveMigration, MigrationManager, MigrationReport};
use crate::mutation::{run_batch, MutationEngine};
use crate::sqlite::SqliteEngine;

/// Typed access to one table, migrated to its declared schema on open.
///
/// # Example
///
/// ```ignore
/// let registry = TypeRegistry::new();
/// let schema = Schema::auto_builder(&registry, "_id")
///     .column::<String>("name")
///     .build()?;
/// let config = MappingConfig::from_env("app/users", 1);
/// let users = LiteMapping::open_with_lmdb(&config, schema)?;
///
/// users.insert(&Row::new().with("name", "ada"))?;
/// let rows = users.query(&QueryArgument::new().set_condition(Condition::eq("name", "ada")))?;
/// ```
pub struct LiteMapping<E = SqliteEngine> {
    identity: TableIdentity,
    schema: Schema,
    engine: E,
    migration: MigrationReport,
}

impl LiteMapping<SqliteEngine> {
    /// Open `<data_dir>/<database>.db` and migrate the table.
    pub fn open(
        config: &MappingConfig,
        schema: Schema,
        metadata: &dyn MetadataStore,
    ) -> MappingResult<Self> {
        let identity = config.validate()?;
        let engine = SqliteEngine::open(config.database_path(&identity))?;
        Self::with_engine(identity, schema, engine, metadata, config.version)
    }

    /// [`open`](Self::open) with the LMDB metadata store under
    /// `<data_dir>/metadata`.
    pub fn open_with_lmdb(config: &MappingConfig, schema: Schema) -> MappingResult<Self> {
        config.validate()?;
        let metadata = LmdbMetadataStore::new(config.metadata_dir(), config.metadata_map_size_mb)?;
        Self::open(config, schema, &metadata)
    }
}

impl<E: SqlEngine> LiteMapping<E> {
    /// Migrate the table on an existing engine.
    pub fn with_engine(
        identity: TableIdentity,
        schema: Schema,
        engine: E,
        metadata: &dyn MetadataStore,
        version: u32,
    ) -> MappingResult<Self> {
        let mut manager = MigrationManager::new(AdditiveMigration::new(metadata, &identity));
        let migration = manager.open(&engine, &schema, version)?;
        tracing::debug!(
            table = %identity.table,
            state = %migration.final_state(),
            version = migration.version,
            "table ready"
        );
        Ok(Self {
            identity,
            schema,
            engine,
            migration,
        })
    }

    pub fn identity(&self) -> &TableIdentity {
        &self.identity
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// What happened while opening.
    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }

    fn mutations(&self) -> MutationEngine<'_> {
        MutationEngine::new(&self.engine, &self.identity.table, &self.schema)
    }

    fn request(&self) -> QueryRequest {
        QueryRequest::new(self.identity.table.clone())
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    pub fn insert(&self, row: &Row) -> MappingResult<i64> {
        self.mutations().insert(row)
    }

    /// Insert an otherwise empty row under `id`. `Ok(false)` if the key is
    /// taken.
    pub fn insert_by_id(&self, id: impl Into<Value>) -> MappingResult<bool> {
        self.mutations().insert_by_id(&id.into(), &Row::new())
    }

    pub fn insert_by_id_with(&self, id: impl Into<Value>, columns: &Row) -> MappingResult<bool> {
        self.mutations().insert_by_id(&id.into(), columns)
    }

    pub fn insert_all_by_id(&self, ids: &[Value]) -> BatchResult<bool> {
        self.mutations().insert_all_by_id(ids)
    }

    pub fn insert_all_by_id_map(&self, entries: &[(Value, Row)]) -> BatchResult<bool> {
        self.mutations().insert_all_by_id_map(entries)
    }

    pub fn insert_all_by_id_with(&self, ids: &[Value], columns: &Row) -> BatchResult<bool> {
        self.mutations().insert_all_by_id_with(ids, columns)
    }

    pub fn insert_all(&self, rows: &[Row]) -> BatchResult<i64> {
        self.mutations().insert_all(rows)
    }

    pub fn batch_insert(&self, count: usize, columns: &Row) -> BatchResult<i64> {
        self.mutations().batch_insert(count, columns)
    }

    pub fn update(&self, id: impl Into<Value>, columns: &Row) -> MappingResult<bool> {
        self.mutations().update(&id.into(), columns)
    }

    pub fn update_all(&self, ids: &[Value], columns: &Row) -> BatchResult<bool> {
        self.mutations().update_all(ids, columns)
    }

    pub fn delete(&self, id: impl Into<Value>) -> MappingResult<bool> {
        self.mutations().delete(&id.into())
    }

    pub fn delete_all(&self, ids: &[Value]) -> BatchResult<bool> {
        self.mutations().delete_all(ids)
    }

    // ========================================================================
    // READS
    // ========================================================================

    fn compiled_request(&self, argument: &QueryArgument) -> MappingResult<QueryRequest> {
        let compiled = argument.compile(&self.schema)?;
        Ok(self
            .request()
            .with_selection(compiled.selection)
            .with_order_by(compiled.order_by)
            .with_limit(compiled.limit))
    }

    pub fn query(&self, argument: &QueryArgument) -> MappingResult<Vec<Row>> {
        let request = self.compiled_request(argument)?;
        rows_from_cursor(self.engine.query(&request)?, &Coercer::new(&self.schema))
    }

    pub fn query_all(&self) -> MappingResult<Vec<Row>> {
        self.query(&QueryArgument::new())
    }

    /// Primary keys of the rows matching `argument`.
    pub fn query_id(&self, argument: &QueryArgument) -> MappingResult<Vec<Value>> {
        let request = self
            .compiled_request(argument)?
            .with_columns(vec![self.schema.primary_key().name.clone()]);
        ids_from_cursor(self.engine.query(&request)?, &Coercer::new(&self.schema))
    }

    pub fn query_all_ids(&self) -> MappingResult<Vec<Value>> {
        self.query_id(&QueryArgument::new())
    }

    fn key_request(&self, id: &Value) -> MappingResult<QueryRequest> {
        let selection = Selection::by_key(&self.schema.primary_key().name, id)?;
        Ok(self.request().with_selection(selection))
    }

    pub fn query_by_id(&self, id: impl Into<Value>) -> MappingResult<Option<Row>> {
        self.row_by_id(&id.into())
    }

    fn row_by_id(&self, id: &Value) -> MappingResult<Option<Row>> {
        let request = self.key_request(id)?;
        let rows = rows_from_cursor(self.engine.query(&request)?, &Coercer::new(&self.schema))?;
        Ok(rows.into_iter().next())
    }

    /// Rows for each id, read in one transaction. Ids with no row are
    /// skipped.
    pub fn query_by_id_list(&self, ids: &[Value]) -> BatchResult<Row> {
        let rows = run_batch(&self.engine, ids, |id| self.row_by_id(id))?;
        Ok(rows.into_iter().flatten().collect())
    }

    /// `true` iff exactly one row has key `id`.
    pub fn contain(&self, id: impl Into<Value>) -> MappingResult<bool> {
        let request = self.key_request(&id.into())?;
        let cursor = ScopedCursor::new(self.engine.query(&request)?);
        Ok(cursor.count() == 1)
    }
}
