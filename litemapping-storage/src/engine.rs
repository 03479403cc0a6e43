//! Engine abstraction and scoped resource guards.
//!
//! The mapping layer never talks to SQLite directly. Everything goes through
//! [`SqlEngine`], which keeps the mutation and query code testable against
//! engines that inject failures.

use std::ops::{Deref, DerefMut};

use litemapping_core::{MappingResult, RawCell, Selection, StorageError, StorageValue};

// ============================================================================
// ENGINE TRAIT
// ============================================================================

/// Minimal relational engine surface used by the mapper.
///
/// Column names passed in `values` are trusted; callers validate them against
/// the schema before they reach the engine.
pub trait SqlEngine: Send + Sync {
    /// Execute a statement that takes no parameters (DDL, pragmas).
    fn execute(&self, sql: &str) -> MappingResult<()>;

    /// Insert one row and return its row id.
    fn insert(&self, table: &str, values: &[(String, StorageValue)]) -> MappingResult<i64>;

    /// Update rows matching `selection`; returns the number of rows changed.
    fn update(
        &self,
        table: &str,
        values: &[(String, StorageValue)],
        selection: &Selection,
    ) -> MappingResult<usize>;

    /// Delete rows matching `selection`; returns the number of rows removed.
    fn delete(&self, table: &str, selection: &Selection) -> MappingResult<usize>;

    /// Run a query and hand back a cursor over its result set.
    fn query(&self, request: &QueryRequest) -> MappingResult<Box<dyn RowCursor>>;

    /// Open a transaction owned by the calling thread. Other threads must
    /// not have their statements run inside it.
    fn begin_transaction(&self) -> MappingResult<()>;
    fn commit_transaction(&self) -> MappingResult<()>;
    fn rollback_transaction(&self) -> MappingResult<()>;

    /// Schema version stored inside the database file.
    fn schema_version(&self) -> MappingResult<u32>;
    fn set_schema_version(&self, version: u32) -> MappingResult<()>;
}

/// Forward-only cursor over a query result.
pub trait RowCursor {
    /// Total number of rows in the result.
    fn count(&self) -> usize;

    fn column_count(&self) -> usize;

    fn column_name(&self, index: usize) -> Option<&str>;

    /// Advance to the next row. Returns `false` once past the last row.
    fn move_to_next(&mut self) -> bool;

    /// Cell at `index` of the current row.
    fn cell(&self, index: usize) -> MappingResult<RawCell>;

    fn close(&mut self) -> MappingResult<()>;

    fn column_index(&self, name: &str) -> Option<usize> {
        (0..self.column_count()).find(|&i| self.column_name(i) == Some(name))
    }
}

// ============================================================================
// QUERY REQUEST
// ============================================================================

/// Everything needed to build a single-table SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRequest {
    pub table: String,
    /// Projected columns. Empty means all columns.
    pub columns: Vec<String>,
    pub selection: Selection,
    pub order_by: Option<String>,
    pub limit: Option<String>,
}

impl QueryRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_order_by(mut self, order_by: Option<String>) -> Self {
        self.order_by = order_by;
        self
    }

    pub fn with_limit(mut self, limit: Option<String>) -> Self {
        self.limit = limit;
        self
    }

    /// Render the statement text. Arguments stay in `selection.args`.
    pub fn to_sql(&self) -> String {
        let projection = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {} FROM {}", projection, self.table);
        if let Some(clause) = &self.selection.clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = &self.limit {
            sql.push_str(" LIMIT ");
            sql.push_str(limit);
        }
        sql
    }
}

// ============================================================================
// GUARDS
// ============================================================================

/// Cursor that is closed when it goes out of scope.
///
/// A failed close is logged and never replaces the caller's result.
pub struct ScopedCursor {
    inner: Box<dyn RowCursor>,
}

impl ScopedCursor {
    pub fn new(inner: Box<dyn RowCursor>) -> Self {
        Self { inner }
    }
}

impl Deref for ScopedCursor {
    type Target = dyn RowCursor;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for ScopedCursor {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for ScopedCursor {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            log_release_failure("cursor", &e.to_string());
        }
    }
}

/// Open transaction that rolls back unless [`commit`](Self::commit) succeeds.
pub struct TransactionGuard<'e> {
    engine: &'e dyn SqlEngine,
    finished: bool,
}

impl<'e> TransactionGuard<'e> {
    pub fn begin(engine: &'e dyn SqlEngine) -> MappingResult<Self> {
        engine.begin_transaction()?;
        Ok(Self {
            engine,
            finished: false,
        })
    }

    pub fn commit(mut self) -> MappingResult<()> {
        let result = self.engine.commit_transaction();
        if result.is_ok() {
            self.finished = true;
        }
        result
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("rolling back transaction");
        if let Err(e) = self.engine.rollback_transaction() {
            log_release_failure("transaction", &e.to_string());
        }
    }
}

fn log_release_failure(resource: &str, reason: &str) {
    let error = StorageError::ResourceReleaseFailure {
        resource: resource.to_string(),
        reason: reason.to_string(),
    };
    tracing::warn!(error = %error, "failed to release resource");
}
