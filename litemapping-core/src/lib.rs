//! LiteMapping Core - Types, Coercion and Query Compilation
//!
//! Pure building blocks with no I/O. The storage crate wires them to an
//! engine; everything here can be exercised without a database.

pub mod coerce;
pub mod config;
pub mod error;
pub mod query;
pub mod row;
pub mod schema;
pub mod types;
pub mod value;

pub use coerce::{Coercer, Decoded};
pub use config::{MappingConfig, TableIdentity, KEY_ALL_COLUMN};
pub use error::{
    BatchError, BatchResult, ConfigError, MappingError, MappingResult, QueryError, SchemaError,
    StorageError, TypeError,
};
pub use query::{
    compile_order, compile_pagination, compile_selection, CompareOp, CompiledQuery, Condition,
    ConditionLink, QueryArgument, Selection,
};
pub use row::Row;
pub use schema::{ColumnSpec, Schema, SchemaBuilder};
pub use types::{AppType, LogicalType, TypeRegistry};
pub use value::{Numeric, RawCell, StorageValue, Value};
