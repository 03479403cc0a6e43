//! Single-row writes and transactional batches.

use litemapping_core::{
    BatchError, BatchResult, Coercer, MappingResult, Row, Schema, Selection, StorageValue,
    TypeError, Value,
};

use crate::engine::{SqlEngine, TransactionGuard};

/// Run `op` over `items` inside one transaction.
///
/// The first failing item rolls everything back and is reported with its
/// index. Results are returned in item order once the transaction commits.
pub fn run_batch<I, T, F>(engine: &dyn SqlEngine, items: I, mut op: F) -> BatchResult<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> MappingResult<T>,
{
    let guard = TransactionGuard::begin(engine).map_err(BatchError::transaction)?;
    let mut results = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        match op(item) {
            Ok(result) => results.push(result),
            Err(cause) => {
                tracing::warn!(index, error = %cause, "batch item failed");
                return Err(BatchError::at(index, cause));
            }
        }
    }
    guard.commit().map_err(BatchError::transaction)?;
    Ok(results)
}

/// Writes rows of one table through an engine.
pub struct MutationEngine<'a> {
    engine: &'a dyn SqlEngine,
    table: &'a str,
    schema: &'a Schema,
}

impl<'a> MutationEngine<'a> {
    pub fn new(engine: &'a dyn SqlEngine, table: &'a str, schema: &'a Schema) -> Self {
        Self {
            engine,
            table,
            schema,
        }
    }

    /// Coerce every cell of `row`. Columns outside the schema are rejected
    /// before they can reach SQL text.
    fn encode(&self, row: &Row) -> MappingResult<Vec<(String, StorageValue)>> {
        let coercer = Coercer::new(self.schema);
        row.iter()
            .map(|(column, value)| {
                if !self.schema.contains(column) {
                    return Err(TypeError::UnknownColumn {
                        column: column.to_string(),
                    }
                    .into());
                }
                Ok((column.to_string(), coercer.to_storage_value(column, value)?))
            })
            .collect()
    }

    fn key_selection(&self, id: &Value) -> MappingResult<Selection> {
        Selection::by_key(&self.schema.primary_key().name, id)
    }

    fn with_id(&self, id: &Value, columns: &Row) -> Row {
        let mut row = columns.clone();
        row.insert(self.schema.primary_key().name.clone(), id.clone());
        row
    }

    /// Insert a row and return the generated row id.
    pub fn insert(&self, row: &Row) -> MappingResult<i64> {
        let values = self.encode(row)?;
        self.engine.insert(self.table, &values)
    }

    /// Insert `columns` under primary key `id`.
    ///
    /// A duplicate key (or any other constraint failure) is `Ok(false)`.
    pub fn insert_by_id(&self, id: &Value, columns: &Row) -> MappingResult<bool> {
        match self.insert(&self.with_id(id, columns)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_constraint_violation() => {
                tracing::debug!(table = self.table, id = %id, error = %e, "insert rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// `true` iff exactly one row was changed.
    pub fn update(&self, id: &Value, columns: &Row) -> MappingResult<bool> {
        let values = self.encode(columns)?;
        let selection = self.key_selection(id)?;
        Ok(self.engine.update(self.table, &values, &selection)? == 1)
    }

    /// `true` iff exactly one row was removed.
    pub fn delete(&self, id: &Value) -> MappingResult<bool> {
        let selection = self.key_selection(id)?;
        Ok(self.engine.delete(self.table, &selection)? == 1)
    }

    // ========================================================================
    // BATCHES
    // ========================================================================

    // Inside a batch a constraint failure aborts the whole batch instead of
    // turning into a `false` flag.

    pub fn insert_all_by_id(&self, ids: &[Value]) -> BatchResult<bool> {
        let empty = Row::new();
        run_batch(self.engine, ids, |id| {
            self.insert(&self.with_id(id, &empty)).map(|_| true)
        })
    }

    pub fn insert_all_by_id_map(&self, entries: &[(Value, Row)]) -> BatchResult<bool> {
        run_batch(self.engine, entries, |(id, columns)| {
            self.insert(&self.with_id(id, columns)).map(|_| true)
        })
    }

    pub fn insert_all_by_id_with(&self, ids: &[Value], columns: &Row) -> BatchResult<bool> {
        run_batch(self.engine, ids, |id| {
            self.insert(&self.with_id(id, columns)).map(|_| true)
        })
    }

    pub fn insert_all(&self, rows: &[Row]) -> BatchResult<i64> {
        run_batch(self.engine, rows, |row| self.insert(row))
    }

    /// Insert the same `columns` `count` times.
    pub fn batch_insert(&self, count: usize, columns: &Row) -> BatchResult<i64> {
        run_batch(self.engine, 0..count, |_| self.insert(columns))
    }

    pub fn update_all(&self, ids: &[Value], columns: &Row) -> BatchResult<bool> {
        run_batch(self.engine, ids, |id| self.update(id, columns))
    }

    pub fn delete_all(&self, ids: &[Value]) -> BatchResult<bool> {
        run_batch(self.engine, ids, |id| self.delete(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::QueryRequest;
    use crate::migration::create_table_statement;
    use crate::sqlite::SqliteEngine;
    use litemapping_core::{MappingError, StorageError, TypeRegistry};

    fn schema() -> Schema {
        let registry = TypeRegistry::new();
        Schema::builder::<Option<i64>>(&registry, "id")
            .column::<String>("name")
            .column::<i32>("age")
            .build()
            .unwrap()
    }

    fn setup() -> (SqliteEngine, Schema) {
        let schema = schema();
        let engine = SqliteEngine::open_in_memory().unwrap();
        engine
            .execute(&create_table_statement("people", &schema))
            .unwrap();
        (engine, schema)
    }

    fn count(engine: &SqliteEngine) -> usize {
        engine.query(&QueryRequest::new("people")).unwrap().count()
    }

    #[test]
    fn test_insert_and_generated_ids() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let first = mutations
            .insert(&Row::new().with("name", "ada").with("age", 36))
            .unwrap();
        let second = mutations.insert(&Row::new()).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(count(&engine), 2);
    }

    #[test]
    fn test_insert_rejects_unknown_column() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let err = mutations
            .insert(&Row::new().with("nickname", Value::Null))
            .unwrap_err();
        assert!(matches!(
            err,
            MappingError::Type(TypeError::UnknownColumn { .. })
        ));
        assert_eq!(count(&engine), 0);
    }

    #[test]
    fn test_insert_by_id_duplicate_is_false() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let columns = Row::new().with("name", "grace");
        assert!(mutations.insert_by_id(&Value::Long(7), &columns).unwrap());
        assert!(!mutations.insert_by_id(&Value::Long(7), &columns).unwrap());

        // Plain insert surfaces the same failure as an error.
        let err = mutations
            .insert(&columns.clone().with("id", 7i64))
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[test]
    fn test_id_overrides_key_in_columns() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let columns = Row::new().with("id", 1i64).with("name", "x");
        assert!(mutations.insert_by_id(&Value::Long(42), &columns).unwrap());
        assert!(mutations.delete(&Value::Long(42)).unwrap());
        assert!(!mutations.delete(&Value::Long(1)).unwrap());
    }

    #[test]
    fn test_update_and_delete_match_exactly_one() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);
        mutations.insert_by_id(&Value::Long(1), &Row::new()).unwrap();

        let columns = Row::new().with("age", 40);
        assert!(mutations.update(&Value::Long(1), &columns).unwrap());
        assert!(!mutations.update(&Value::Long(2), &columns).unwrap());

        assert!(mutations.delete(&Value::Long(1)).unwrap());
        assert!(!mutations.delete(&Value::Long(1)).unwrap());
    }

    #[test]
    fn test_update_type_mismatch() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);
        mutations.insert_by_id(&Value::Long(1), &Row::new()).unwrap();

        let err = mutations
            .update(&Value::Long(1), &Row::new().with("age", "forty"))
            .unwrap_err();
        assert!(matches!(
            err,
            MappingError::Type(TypeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_results_in_order() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let ids = mutations
            .insert_all(&[
                Row::new().with("name", "a"),
                Row::new().with("name", "b"),
            ])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);

        let ids = mutations
            .batch_insert(3, &Row::new().with("age", 1))
            .unwrap();
        assert_eq!(ids, vec![3, 4, 5]);

        let flags = mutations
            .update_all(&[Value::Long(1), Value::Long(99)], &Row::new().with("age", 2))
            .unwrap();
        assert_eq!(flags, vec![true, false]);

        let flags = mutations
            .delete_all(&[Value::Long(2), Value::Long(2)])
            .unwrap();
        assert_eq!(flags, vec![true, false]);
        assert_eq!(count(&engine), 4);
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);
        mutations.insert_by_id(&Value::Long(3), &Row::new()).unwrap();

        let err = mutations
            .insert_all_by_id(&[Value::Long(1), Value::Long(2), Value::Long(3), Value::Long(4)])
            .unwrap_err();
        assert_eq!(err.index, Some(2));
        assert!(err.cause.is_constraint_violation());
        assert_eq!(count(&engine), 1);

        // The engine is usable again after the rollback.
        let flags = mutations
            .insert_all_by_id_with(&[Value::Long(1), Value::Long(2)], &Row::new().with("name", "n"))
            .unwrap();
        assert_eq!(flags, vec![true, true]);
        assert_eq!(count(&engine), 3);
    }

    #[test]
    fn test_batch_by_id_map() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let flags = mutations
            .insert_all_by_id_map(&[
                (Value::Long(10), Row::new().with("name", "ten")),
                (Value::Long(11), Row::new().with("age", 11)),
            ])
            .unwrap();
        assert_eq!(flags, vec![true, true]);

        let err = mutations
            .insert_all_by_id_map(&[(Value::Long(12), Row::new().with("bogus", 1))])
            .unwrap_err();
        assert_eq!(err.index, Some(0));
        assert!(matches!(
            err.cause,
            MappingError::Type(TypeError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn test_empty_batch_commits() {
        let (engine, schema) = setup();
        let mutations = MutationEngine::new(&engine, "people", &schema);
        assert_eq!(mutations.delete_all(&[]).unwrap(), Vec::<bool>::new());
        assert!(mutations.insert(&Row::new()).is_ok());
    }

    #[test]
    fn test_begin_failure_has_no_index() {
        let (engine, schema) = setup();
        engine.begin_transaction().unwrap();
        let mutations = MutationEngine::new(&engine, "people", &schema);

        let err = mutations.insert_all(&[Row::new()]).unwrap_err();
        assert_eq!(err.index, None);
        assert!(matches!(
            err.cause,
            MappingError::Storage(StorageError::EngineFailure { .. })
        ));
        engine.rollback_transaction().unwrap();
    }
}
