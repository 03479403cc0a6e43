//! Cursor to row conversion.

use litemapping_core::{Coercer, Decoded, MappingResult, Row, StorageError, Value};

use crate::engine::{RowCursor, ScopedCursor};

/// Drain `cursor` into rows.
///
/// Columns the schema does not declare are left out of each row. The cursor
/// is closed on every exit path.
pub fn rows_from_cursor(cursor: Box<dyn RowCursor>, coercer: &Coercer<'_>) -> MappingResult<Vec<Row>> {
    let mut cursor = ScopedCursor::new(cursor);
    let schema = coercer.schema();
    // (cursor index, name) of every declared column in the result.
    let mut columns = Vec::with_capacity(cursor.column_count());
    for index in 0..cursor.column_count() {
        let name = cursor
            .column_name(index)
            .ok_or_else(|| StorageError::EngineFailure {
                reason: format!("result column {} has no name", index),
            })?;
        if schema.contains(name) {
            columns.push((index, name.to_string()));
        }
    }

    let mut rows = Vec::with_capacity(cursor.count());
    while cursor.move_to_next() {
        let mut row = Row::with_capacity(columns.len());
        for (index, column) in &columns {
            let cell = cursor.cell(*index)?;
            if let Decoded::Value(value) = coercer.from_storage_value(column, &cell)? {
                row.insert(column.as_str(), value);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Drain `cursor` into primary-key values.
pub fn ids_from_cursor(cursor: Box<dyn RowCursor>, coercer: &Coercer<'_>) -> MappingResult<Vec<Value>> {
    let mut cursor = ScopedCursor::new(cursor);
    let key = &coercer.schema().primary_key().name;
    let index = cursor
        .column_index(key)
        .ok_or_else(|| StorageError::EngineFailure {
            reason: format!("primary key column {} missing from result", key),
        })?;

    let mut ids = Vec::with_capacity(cursor.count());
    while cursor.move_to_next() {
        let cell = cursor.cell(index)?;
        match coercer.from_storage_value(key, &cell)? {
            Decoded::Value(value) => ids.push(value),
            Decoded::Skip => {}
        }
    }
    Ok(ids)
}
