//! SQLite engine backed by rusqlite.

use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use litemapping_core::{MappingError, MappingResult, RawCell, Selection, StorageError, StorageValue};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};

use crate::engine::{QueryRequest, RowCursor, SqlEngine};

/// Map a rusqlite error onto the mapper's storage errors.
///
/// Only constraint failures get their own variant; callers branch on them.
fn map_sqlite_error(err: rusqlite::Error) -> MappingError {
    let storage = match &err {
        rusqlite::Error::SqliteFailure(code, message)
            if code.code == ErrorCode::ConstraintViolation =>
        {
            StorageError::ConstraintViolation {
                reason: message.clone().unwrap_or_else(|| code.to_string()),
            }
        }
        _ => StorageError::EngineFailure {
            reason: err.to_string(),
        },
    };
    storage.into()
}

fn to_sql_value(value: &StorageValue) -> SqlValue {
    match value {
        StorageValue::Null => SqlValue::Null,
        StorageValue::Int32(v) => SqlValue::Integer(*v as i64),
        StorageValue::Int64(v) => SqlValue::Integer(*v),
        StorageValue::Real32(v) => SqlValue::Real(*v as f64),
        StorageValue::Real64(v) => SqlValue::Real(*v),
        StorageValue::Text(v) => SqlValue::Text(v.clone()),
        StorageValue::Blob(v) => SqlValue::Blob(v.clone()),
    }
}

fn to_raw_cell(value: ValueRef<'_>) -> RawCell {
    match value {
        ValueRef::Null => RawCell::Null,
        ValueRef::Integer(v) => RawCell::Integer(v),
        ValueRef::Real(v) => RawCell::Real(v),
        ValueRef::Text(bytes) => RawCell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => RawCell::Blob(bytes.to_vec()),
    }
}

/// Selection arguments are always bound as text.
fn selection_params(selection: &Selection) -> impl Iterator<Item = SqlValue> + '_ {
    selection.args.iter().cloned().map(SqlValue::Text)
}

fn empty_values(table: &str) -> MappingError {
    StorageError::EngineFailure {
        reason: format!("no values to write into {}", table),
    }
    .into()
}

fn poisoned() -> MappingError {
    StorageError::EngineFailure {
        reason: "sqlite connection lock poisoned".to_string(),
    }
    .into()
}

struct Session {
    conn: Connection,
    /// Thread with an open transaction; everyone else waits for it.
    owner: Option<ThreadId>,
}

/// A single SQLite connection shared behind a mutex.
///
/// An open transaction belongs to the thread that began it. Statements from
/// other threads block until it commits or rolls back, so they can never be
/// swept into someone else's rollback.
pub struct SqliteEngine {
    session: Mutex<Session>,
    released: Condvar,
    path: Option<PathBuf>,
}

impl SqliteEngine {
    /// Open (or create) the database file, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> MappingResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::EngineFailure {
                reason: format!("cannot create {}: {}", parent.display(), e),
            })?;
        }
        let conn = Connection::open(path).map_err(map_sqlite_error)?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self::from_connection(conn, Some(path.to_path_buf())))
    }

    pub fn open_in_memory() -> MappingResult<Self> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Ok(Self::from_connection(conn, None))
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Self {
        Self {
            session: Mutex::new(Session { conn, owner: None }),
            released: Condvar::new(),
            path,
        }
    }

    /// Database file, or `None` for in-memory engines.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Lock the connection once no other thread holds a transaction.
    fn lock(&self) -> MappingResult<MutexGuard<'_, Session>> {
        let me = thread::current().id();
        let mut session = self.session.lock().map_err(|_| poisoned())?;
        while session.owner.is_some_and(|owner| owner != me) {
            session = self.released.wait(session).map_err(|_| poisoned())?;
        }
        Ok(session)
    }

    fn release(&self, mut session: MutexGuard<'_, Session>) {
        session.owner = None;
        drop(session);
        self.released.notify_all();
    }
}

impl SqlEngine for SqliteEngine {
    fn execute(&self, sql: &str) -> MappingResult<()> {
        tracing::debug!(sql, "execute");
        self.lock()?.conn.execute_batch(sql).map_err(map_sqlite_error)
    }

    fn insert(&self, table: &str, values: &[(String, StorageValue)]) -> MappingResult<i64> {
        let session = self.lock()?;
        let conn = &session.conn;
        if values.is_empty() {
            conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", table), [])
                .map_err(map_sqlite_error)?;
        } else {
            let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
            let placeholders = vec!["?"; values.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            );
            conn.execute(&sql, params_from_iter(values.iter().map(|(_, v)| to_sql_value(v))))
                .map_err(map_sqlite_error)?;
        }
        Ok(conn.last_insert_rowid())
    }

    fn update(
        &self,
        table: &str,
        values: &[(String, StorageValue)],
        selection: &Selection,
    ) -> MappingResult<usize> {
        if values.is_empty() {
            return Err(empty_values(table));
        }
        let assignments: Vec<String> = values.iter().map(|(c, _)| format!("{} = ?", c)).collect();
        let mut sql = format!("UPDATE {} SET {}", table, assignments.join(", "));
        if let Some(clause) = &selection.clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        let params = values
            .iter()
            .map(|(_, v)| to_sql_value(v))
            .chain(selection_params(selection));
        self.lock()?
            .conn
            .execute(&sql, params_from_iter(params))
            .map_err(map_sqlite_error)
    }

    fn delete(&self, table: &str, selection: &Selection) -> MappingResult<usize> {
        let mut sql = format!("DELETE FROM {}", table);
        if let Some(clause) = &selection.clause {
            sql.push_str(" WHERE ");
            sql.push_str(clause);
        }
        self.lock()?
            .conn
            .execute(&sql, params_from_iter(selection_params(selection)))
            .map_err(map_sqlite_error)
    }

    fn query(&self, request: &QueryRequest) -> MappingResult<Box<dyn RowCursor>> {
        let sql = request.to_sql();
        tracing::debug!(sql = %sql, args = ?request.selection.args, "query");

        let session = self.lock()?;
        let mut stmt = session.conn.prepare(&sql).map_err(map_sqlite_error)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt
            .query(params_from_iter(selection_params(&request.selection)))
            .map_err(map_sqlite_error)?;

        let mut materialized = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqlite_error)? {
            let mut cells = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                cells.push(to_raw_cell(row.get_ref(index).map_err(map_sqlite_error)?));
            }
            materialized.push(cells);
        }

        Ok(Box::new(SqliteCursor::new(columns, materialized)))
    }

    fn begin_transaction(&self) -> MappingResult<()> {
        let mut session = self.lock()?;
        session.conn.execute_batch("BEGIN").map_err(map_sqlite_error)?;
        session.owner = Some(thread::current().id());
        Ok(())
    }

    fn commit_transaction(&self) -> MappingResult<()> {
        let session = self.lock()?;
        // A failed COMMIT leaves the transaction open for the rollback.
        session.conn.execute_batch("COMMIT").map_err(map_sqlite_error)?;
        self.release(session);
        Ok(())
    }

    fn rollback_transaction(&self) -> MappingResult<()> {
        let session = self.lock()?;
        let result = session.conn.execute_batch("ROLLBACK");
        self.release(session);
        result.map_err(map_sqlite_error)
    }

    fn schema_version(&self) -> MappingResult<u32> {
        let version: i64 = self
            .lock()?
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(map_sqlite_error)?;
        u32::try_from(version).map_err(|_| {
            StorageError::EngineFailure {
                reason: format!("invalid user_version {}", version),
            }
            .into()
        })
    }

    fn set_schema_version(&self, version: u32) -> MappingResult<()> {
        self.execute(&format!("PRAGMA user_version = {}", version))
    }
}

// ============================================================================
// CURSOR
// ============================================================================

/// Fully materialized result set.
#[derive(Debug, Clone, Default)]
pub struct SqliteCursor {
    columns: Vec<String>,
    rows: Vec<Vec<RawCell>>,
    position: Option<usize>,
    closed: bool,
}

impl SqliteCursor {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self {
            columns,
            rows,
            position: None,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RowCursor for SqliteCursor {
    fn count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn move_to_next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        if next < self.rows.len() {
            self.position = Some(next);
            true
        } else {
            self.position = Some(self.rows.len());
            false
        }
    }

    fn cell(&self, index: usize) -> MappingResult<RawCell> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| StorageError::EngineFailure {
                reason: "cursor is not positioned on a row".to_string(),
            })?;
        row.get(index).cloned().ok_or_else(|| {
            StorageError::EngineFailure {
                reason: format!("column index {} out of range", index),
            }
            .into()
        })
    }

    fn close(&mut self) -> MappingResult<()> {
        self.closed = true;
        self.rows.clear();
        self.position = None;
        Ok(())
    }
}
