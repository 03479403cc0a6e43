//! LiteMapping Storage - Engine, Migration and Table Handle
//!
//! Wires the pure pieces from `litemapping-core` to SQLite (through
//! rusqlite) and keeps per-table metadata in LMDB (through heed).

pub mod engine;
pub mod mapping;
pub mod marshal;
pub mod metadata;
pub mod migration;
pub mod mutation;
pub mod sqlite;

pub use engine::{QueryRequest, RowCursor, ScopedCursor, SqlEngine, TransactionGuard};
pub use mapping::LiteMapping;
pub use marshal::{ids_from_cursor, rows_from_cursor};
pub use metadata::{InMemoryMetadataStore, LmdbMetadataError, LmdbMetadataStore, MetadataStore};
pub use migration::{
    add_column_statements, create_table_statement, AdditiveMigration, MigrationManager,
    MigrationReport, MigrationState, SchemaLifecycle,
};
pub use mutation::{run_batch, MutationEngine};
pub use sqlite::{SqliteCursor, SqliteEngine};
