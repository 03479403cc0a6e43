//! Error types for LiteMapping operations

use crate::LogicalType;
use thiserror::Error;

/// Type registry and coercion errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("Unknown application type: {type_name}")]
    UnknownType { type_name: String },

    #[error("Unknown column: {column}")]
    UnknownColumn { column: String },

    #[error("Type mismatch on column {column}: expected {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: LogicalType,
        found: String,
    },
}

/// Query compilation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid pagination: page {page} requested without a page size")]
    InvalidPagination { page: u32 },
}

/// Schema construction errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate column: {column}")]
    DuplicateColumn { column: String },

    #[error("Invalid column name: {column:?}")]
    InvalidColumnName { column: String },

    #[error("Schema has no primary key")]
    MissingPrimaryKey,

    #[error("Schema declares more than one primary key: {first} and {second}")]
    MultiplePrimaryKeys { first: String, second: String },

    #[error("Autoincrement requires an integer primary key, {column} is {logical_type}")]
    InvalidAutoincrement {
        column: String,
        logical_type: LogicalType,
    },
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Constraint violation: {reason}")]
    ConstraintViolation { reason: String },

    #[error("Engine failure: {reason}")]
    EngineFailure { reason: String },

    #[error("Failed to release {resource}: {reason}")]
    ResourceReleaseFailure { resource: String, reason: String },

    #[error("Metadata store failure: {reason}")]
    MetadataFailure { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid table path {path}: expected <database>/<table>")]
    InvalidPath { path: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all LiteMapping errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Type error: {0}")]
    Type(#[from] TypeError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl MappingError {
    /// True when the engine rejected a write because of a key or uniqueness constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            MappingError::Storage(StorageError::ConstraintViolation { .. })
        )
    }
}

/// Result type alias for LiteMapping operations.
pub type MappingResult<T> = Result<T, MappingError>;

/// Failure of a transactional batch.
///
/// The whole batch was rolled back. `index` names the item that failed, or is
/// `None` when the transaction itself could not be opened or committed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Batch rolled back at item {index:?}: {cause}")]
pub struct BatchError {
    pub index: Option<usize>,
    pub cause: MappingError,
}

impl BatchError {
    pub fn at(index: usize, cause: MappingError) -> Self {
        Self {
            index: Some(index),
            cause,
        }
    }

    pub fn transaction(cause: MappingError) -> Self {
        Self { index: None, cause }
    }
}

/// Result of a batch operation: every per-item result, or the failure that rolled it back.
pub type BatchResult<T> = Result<Vec<T>, BatchError>;

// =============================================================================
// TESTS
// =============================================================================
