//! Version-gated, additive schema migration.
//!
//! The database file records its schema version. Opening a handle compares
//! it with the declared version:
//!
//! - stored version 0: the table is created ([`SchemaLifecycle::on_create`])
//! - declared version greater: new columns are added
//!   ([`SchemaLifecycle::on_upgrade`])
//! - otherwise nothing happens
//!
//! DDL and the version bump share one transaction. Metadata is written only
//! after that transaction commits.

use std::fmt;

use litemapping_core::{ConfigError, MappingResult, Schema, TableIdentity, KEY_ALL_COLUMN};
use serde::{Deserialize, Serialize};

use crate::engine::{QueryRequest, ScopedCursor, SqlEngine, TransactionGuard};
use crate::metadata::MetadataStore;

// ============================================================================
// DDL
// ============================================================================

/// `CREATE TABLE IF NOT EXISTS` for the whole schema, primary key first.
pub fn create_table_statement(table: &str, schema: &Schema) -> String {
    let definitions: Vec<String> = schema.columns().iter().map(|c| c.definition()).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table,
        definitions.join(", ")
    )
}

/// `ALTER TABLE ... ADD COLUMN` for each declared column missing from
/// `previous`, in declared order.
pub fn add_column_statements(table: &str, schema: &Schema, previous: &[String]) -> Vec<String> {
    schema
        .data_columns()
        .iter()
        .filter(|c| !previous.contains(&c.name))
        .map(|c| format!("ALTER TABLE {} ADD COLUMN {}", table, c.definition()))
        .collect()
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Hooks driven by [`MigrationManager`].
pub trait SchemaLifecycle {
    /// Build the table in a fresh database. Runs inside the open transaction
    /// and returns the statements it executed.
    fn on_create(&self, engine: &dyn SqlEngine, schema: &Schema) -> MappingResult<Vec<String>>;

    /// Bring an existing table from `old` to `new`. Same transaction rules
    /// as [`on_create`](Self::on_create).
    fn on_upgrade(
        &self,
        engine: &dyn SqlEngine,
        schema: &Schema,
        old: u32,
        new: u32,
    ) -> MappingResult<Vec<String>>;

    /// Called after a create or upgrade transaction committed.
    fn on_committed(&self, schema: &Schema) -> MappingResult<()>;
}

/// Creates the table and only ever adds columns.
///
/// The set of data columns the table was last migrated to lives in the
/// metadata store; upgrades diff the declared columns against it.
pub struct AdditiveMigration<'m> {
    metadata: &'m dyn MetadataStore,
    table: String,
    namespace: String,
}

impl<'m> AdditiveMigration<'m> {
    pub fn new(metadata: &'m dyn MetadataStore, identity: &TableIdentity) -> Self {
        Self {
            metadata,
            table: identity.table.clone(),
            namespace: identity.metadata_namespace(),
        }
    }

    /// Columns recorded by the last migration.
    ///
    /// When nothing was recorded the live table is inspected instead, so a
    /// lost metadata store does not lead to duplicate ADD COLUMN statements.
    fn previous_columns(&self, engine: &dyn SqlEngine, schema: &Schema) -> MappingResult<Vec<String>> {
        if let Some(columns) = self.metadata.string_set(&self.namespace, KEY_ALL_COLUMN)? {
            return Ok(columns);
        }
        tracing::warn!(
            namespace = %self.namespace,
            "no recorded columns, reading them from the table"
        );
        let request = QueryRequest::new(self.table.clone()).with_limit(Some("0".to_string()));
        let cursor = ScopedCursor::new(engine.query(&request)?);
        let key = &schema.primary_key().name;
        Ok((0..cursor.column_count())
            .filter_map(|i| cursor.column_name(i))
            .filter(|name| *name != key.as_str())
            .map(String::from)
            .collect())
    }

    fn run(&self, engine: &dyn SqlEngine, statements: Vec<String>) -> MappingResult<Vec<String>> {
        for statement in &statements {
            tracing::debug!(table = %self.table, sql = %statement, "ddl");
            engine.execute(statement)?;
        }
        Ok(statements)
    }
}

impl SchemaLifecycle for AdditiveMigration<'_> {
    fn on_create(&self, engine: &dyn SqlEngine, schema: &Schema) -> MappingResult<Vec<String>> {
        tracing::info!(table = %self.table, "creating table");
        self.run(engine, vec![create_table_statement(&self.table, schema)])
    }

    fn on_upgrade(
        &self,
        engine: &dyn SqlEngine,
        schema: &Schema,
        old: u32,
        new: u32,
    ) -> MappingResult<Vec<String>> {
        let previous = self.previous_columns(engine, schema)?;
        let statements = add_column_statements(&self.table, schema, &previous);
        tracing::info!(
            table = %self.table,
            old,
            new,
            added = statements.len(),
            "upgrading table"
        );
        self.run(engine, statements)
    }

    fn on_committed(&self, schema: &Schema) -> MappingResult<()> {
        self.metadata
            .put_string_set(&self.namespace, KEY_ALL_COLUMN, &schema.data_column_names())
    }
}

// ============================================================================
// MANAGER
// ============================================================================

/// Where a handle is in its open sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationState {
    Uninitialized,
    Created,
    Upgraded { from: u32, to: u32 },
    Open,
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationState::Uninitialized => write!(f, "uninitialized"),
            MigrationState::Created => write!(f, "created"),
            MigrationState::Upgraded { from, to } => write!(f, "upgraded({} -> {})", from, to),
            MigrationState::Open => write!(f, "open"),
        }
    }
}

/// Outcome of [`MigrationManager::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Version stored in the database before opening.
    pub stored_version: u32,
    /// Version stored after opening.
    pub version: u32,
    /// States passed through, ending in [`MigrationState::Open`].
    pub transitions: Vec<MigrationState>,
    /// DDL executed, in order.
    pub statements: Vec<String>,
}

impl MigrationReport {
    pub fn created(&self) -> bool {
        self.transitions.contains(&MigrationState::Created)
    }

    pub fn upgraded(&self) -> bool {
        self.transitions
            .iter()
            .any(|s| matches!(s, MigrationState::Upgraded { .. }))
    }

    pub fn final_state(&self) -> MigrationState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(MigrationState::Uninitialized)
    }
}

/// Runs a [`SchemaLifecycle`] once per handle.
pub struct MigrationManager<L> {
    lifecycle: L,
    state: MigrationState,
}

impl<L: SchemaLifecycle> MigrationManager<L> {
    pub fn new(lifecycle: L) -> Self {
        Self {
            lifecycle,
            state: MigrationState::Uninitialized,
        }
    }

    pub fn state(&self) -> MigrationState {
        self.state
    }

    /// Bring the database to `version`.
    ///
    /// Calling this again once open is a no-op that reports no statements.
    pub fn open(
        &mut self,
        engine: &dyn SqlEngine,
        schema: &Schema,
        version: u32,
    ) -> MappingResult<MigrationReport> {
        if version == 0 {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                value: version.to_string(),
                reason: "version must be at least 1".to_string(),
            }
            .into());
        }

        let stored_version = engine.schema_version()?;
        let mut transitions = Vec::new();

        if self.state == MigrationState::Open || stored_version >= version {
            if stored_version > version {
                tracing::info!(stored_version, version, "declared version is older, leaving schema as is");
            }
            self.state = MigrationState::Open;
            transitions.push(MigrationState::Open);
            return Ok(MigrationReport {
                stored_version,
                version: stored_version,
                transitions,
                statements: Vec::new(),
            });
        }

        let guard = TransactionGuard::begin(engine)?;
        let (state, statements) = if stored_version == 0 {
            let statements = self.lifecycle.on_create(engine, schema)?;
            (MigrationState::Created, statements)
        } else {
            let statements = self
                .lifecycle
                .on_upgrade(engine, schema, stored_version, version)?;
            (
                MigrationState::Upgraded {
                    from: stored_version,
                    to: version,
                },
                statements,
            )
        };
        engine.set_schema_version(version)?;
        guard.commit()?;

        self.state = state;
        transitions.push(state);
        self.lifecycle.on_committed(schema)?;

        self.state = MigrationState::Open;
        transitions.push(MigrationState::Open);
        Ok(MigrationReport {
            stored_version,
            version,
            transitions,
            statements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadataStore;
    use crate::sqlite::SqliteEngine;
    use litemapping_core::{MappingError, TypeRegistry};
    use proptest::prelude::*;

    fn identity() -> TableIdentity {
        TableIdentity::parse("app/notes").unwrap()
    }

    fn schema_v1(registry: &TypeRegistry) -> Schema {
        Schema::auto_builder(registry, "id")
            .column::<String>("title")
            .column::<i32>("stars")
            .build()
            .unwrap()
    }

    fn schema_v2(registry: &TypeRegistry) -> Schema {
        Schema::auto_builder(registry, "id")
            .column::<String>("title")
            .column::<i32>("stars")
            .column::<bool>("pinned")
            .column::<Option<f64>>("weight")
            .build()
            .unwrap()
    }

    fn open(
        engine: &SqliteEngine,
        metadata: &InMemoryMetadataStore,
        schema: &Schema,
        version: u32,
    ) -> MappingResult<MigrationReport> {
        let identity = identity();
        let mut manager = MigrationManager::new(AdditiveMigration::new(metadata, &identity));
        assert_eq!(manager.state(), MigrationState::Uninitialized);
        let report = manager.open(engine, schema, version)?;
        assert_eq!(manager.state(), MigrationState::Open);
        Ok(report)
    }

    #[test]
    fn test_create_table_statement() {
        let registry = TypeRegistry::new();
        let schema = Schema::builder::<i64>(&registry, "id")
            .column::<Option<i32>>("a")
            .column::<bool>("b")
            .column::<Option<bool>>("c")
            .column::<char>("d")
            .column::<f32>("e")
            .column::<Vec<u8>>("f")
            .build()
            .unwrap();
        assert_eq!(
            create_table_statement("t", &schema),
            "CREATE TABLE IF NOT EXISTS t (id integer default 0 primary key, a integer, \
             b char(5) default 'false', c char(5), d char(1), e decimal default 0, f blob)"
        );
    }

    #[test]
    fn test_add_column_statements() {
        let registry = TypeRegistry::new();
        let schema = schema_v2(&registry);
        let previous = vec!["stars".to_string(), "title".to_string()];
        assert_eq!(
            add_column_statements("notes", &schema, &previous),
            vec![
                "ALTER TABLE notes ADD COLUMN pinned char(5) default 'false'".to_string(),
                "ALTER TABLE notes ADD COLUMN weight decimal".to_string(),
            ]
        );
        assert!(add_column_statements("notes", &schema, &schema.data_column_names()).is_empty());
    }

    #[test]
    fn test_fresh_database_is_created() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        let metadata = InMemoryMetadataStore::new();

        let report = open(&engine, &metadata, &schema_v1(&registry), 1).unwrap();
        assert!(report.created());
        assert_eq!(report.stored_version, 0);
        assert_eq!(report.version, 1);
        assert_eq!(
            report.transitions,
            vec![MigrationState::Created, MigrationState::Open]
        );
        assert_eq!(report.statements.len(), 1);
        assert_eq!(engine.schema_version().unwrap(), 1);
        assert_eq!(
            metadata.string_set("app.notes", KEY_ALL_COLUMN).unwrap(),
            Some(vec!["title".to_string(), "stars".to_string()])
        );
    }

    #[test]
    fn test_same_version_is_noop() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        let metadata = InMemoryMetadataStore::new();
        open(&engine, &metadata, &schema_v1(&registry), 1).unwrap();

        let report = open(&engine, &metadata, &schema_v1(&registry), 1).unwrap();
        assert!(report.statements.is_empty());
        assert_eq!(report.final_state(), MigrationState::Open);
    }

    #[test]
    fn test_upgrade_adds_only_new_columns() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        let metadata = InMemoryMetadataStore::new();
        open(&engine, &metadata, &schema_v1(&registry), 1).unwrap();

        let report = open(&engine, &metadata, &schema_v2(&registry), 2).unwrap();
        assert!(report.upgraded());
        assert_eq!(
            report.transitions,
            vec![
                MigrationState::Upgraded { from: 1, to: 2 },
                MigrationState::Open
            ]
        );
        assert_eq!(report.statements.len(), 2);
        assert_eq!(engine.schema_version().unwrap(), 2);
        assert_eq!(
            metadata.string_set("app.notes", KEY_ALL_COLUMN).unwrap(),
            Some(schema_v2(&registry).data_column_names())
        );

        let cursor = engine.query(&QueryRequest::new("notes")).unwrap();
        assert_eq!(cursor.column_count(), 5);

        // Bumping the version again with the same columns emits nothing.
        let report = open(&engine, &metadata, &schema_v2(&registry), 3).unwrap();
        assert!(report.upgraded());
        assert!(report.statements.is_empty());
    }

    #[test]
    fn test_downgrade_is_noop() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        let metadata = InMemoryMetadataStore::new();
        open(&engine, &metadata, &schema_v2(&registry), 3).unwrap();

        let report = open(&engine, &metadata, &schema_v1(&registry), 2).unwrap();
        assert!(report.statements.is_empty());
        assert_eq!(report.version, 3);
        assert_eq!(engine.schema_version().unwrap(), 3);
    }

    #[test]
    fn test_upgrade_without_metadata_reads_table() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        open(&engine, &InMemoryMetadataStore::new(), &schema_v1(&registry), 1).unwrap();

        let fresh_metadata = InMemoryMetadataStore::new();
        let report = open(&engine, &fresh_metadata, &schema_v2(&registry), 2).unwrap();
        assert_eq!(report.statements.len(), 2);
    }

    #[test]
    fn test_failed_upgrade_rolls_back() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        let metadata = InMemoryMetadataStore::new();
        open(&engine, &metadata, &schema_v1(&registry), 1).unwrap();

        // Claim a column was never added so the upgrade tries to add it twice.
        metadata
            .put_string_set("app.notes", KEY_ALL_COLUMN, &["title".to_string()])
            .unwrap();
        let err = open(&engine, &metadata, &schema_v2(&registry), 2).unwrap_err();
        assert!(matches!(err, MappingError::Storage(_)));
        assert_eq!(engine.schema_version().unwrap(), 1);
        assert_eq!(
            metadata.string_set("app.notes", KEY_ALL_COLUMN).unwrap(),
            Some(vec!["title".to_string()])
        );
        let cursor = engine.query(&QueryRequest::new("notes")).unwrap();
        assert_eq!(cursor.column_count(), 3);
    }

    #[test]
    fn test_version_zero_rejected() {
        let registry = TypeRegistry::new();
        let engine = SqliteEngine::open_in_memory().unwrap();
        let metadata = InMemoryMetadataStore::new();
        let err = open(&engine, &metadata, &schema_v1(&registry), 0);
        assert!(matches!(err, Err(MappingError::Config(_))));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            MigrationState::Upgraded { from: 1, to: 2 }.to_string(),
            "upgraded(1 -> 2)"
        );
        assert_eq!(MigrationState::Open.to_string(), "open");
    }

    proptest! {
        #[test]
        fn prop_upgrade_adds_exactly_the_missing_columns(
            known in proptest::collection::vec(any::<bool>(), 4)
        ) {
            let registry = TypeRegistry::new();
            let schema = schema_v2(&registry);
            let previous: Vec<String> = schema
                .data_column_names()
                .into_iter()
                .zip(&known)
                .filter(|(_, k)| **k)
                .map(|(name, _)| name)
                .collect();

            let statements = add_column_statements("notes", &schema, &previous);
            prop_assert_eq!(statements.len(), 4 - previous.len());
            for column in schema.data_columns() {
                let added = statements.iter().any(|s| s.ends_with(&column.definition()));
                prop_assert_eq!(added, !previous.contains(&column.name));
            }
        }
    }
}
