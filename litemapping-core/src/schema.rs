//! Table schema: ordered column declarations with exactly one primary key.

use crate::config::is_identifier;
use crate::{AppType, LogicalType, MappingResult, SchemaError, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declaration of a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub app_type: AppType,
    pub is_primary_key: bool,
    pub autoincrement: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, app_type: AppType) -> Self {
        Self {
            name: name.into(),
            app_type,
            is_primary_key: false,
            autoincrement: false,
        }
    }

    pub fn logical_type(&self) -> LogicalType {
        self.app_type.logical
    }

    /// Column definition as it appears inside CREATE TABLE.
    pub fn definition(&self) -> String {
        let mut def = format!("{} {}", self.name, self.app_type.sql_type());
        if self.is_primary_key {
            def.push_str(" primary key");
            if self.autoincrement {
                def.push_str(" autoincrement");
            }
        }
        def
    }
}

/// Ordered set of columns; the primary key is always first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Start a schema whose primary key is `name` of type `T`.
    pub fn builder<'r, T: 'static>(
        registry: &'r TypeRegistry,
        name: impl Into<String>,
    ) -> SchemaBuilder<'r> {
        SchemaBuilder::new(registry).primary_key::<T>(name)
    }

    /// Start a schema keyed by an autoincrement `Option<i64>` column.
    pub fn auto_builder<'r>(registry: &'r TypeRegistry, name: impl Into<String>) -> SchemaBuilder<'r> {
        Self::builder::<Option<i64>>(registry, name).autoincrement()
    }

    /// Build from explicit column specs, validating the schema invariants.
    pub fn from_columns(columns: Vec<ColumnSpec>) -> MappingResult<Self> {
        let mut primary: Option<&ColumnSpec> = None;
        let mut index = HashMap::with_capacity(columns.len());
        for (position, column) in columns.iter().enumerate() {
            check_name(&column.name)?;
            if index.insert(column.name.clone(), position).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    column: column.name.clone(),
                }
                .into());
            }
            if column.is_primary_key {
                if let Some(first) = primary {
                    return Err(SchemaError::MultiplePrimaryKeys {
                        first: first.name.clone(),
                        second: column.name.clone(),
                    }
                    .into());
                }
                if column.autoincrement && !column.logical_type().is_integer() {
                    return Err(SchemaError::InvalidAutoincrement {
                        column: column.name.clone(),
                        logical_type: column.logical_type(),
                    }
                    .into());
                }
                primary = Some(column);
            }
        }
        if primary.is_none() {
            return Err(SchemaError::MissingPrimaryKey.into());
        }

        // Primary key first, the rest in declaration order.
        let mut columns = columns;
        columns.sort_by_key(|c| !c.is_primary_key);
        let index = columns
            .iter()
            .enumerate()
            .map(|(position, c)| (c.name.clone(), position))
            .collect();
        Ok(Self { columns, index })
    }

    pub fn primary_key(&self) -> &ColumnSpec {
        &self.columns[0]
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// All columns except the primary key, in declaration order.
    pub fn data_columns(&self) -> &[ColumnSpec] {
        &self.columns[1..]
    }

    pub fn data_column_names(&self) -> Vec<String> {
        self.data_columns().iter().map(|c| c.name.clone()).collect()
    }

    /// Append a column. Only used for additive evolution; the name must be new.
    pub fn append(&mut self, column: ColumnSpec) -> MappingResult<()> {
        check_name(&column.name)?;
        if self.index.contains_key(&column.name) {
            return Err(SchemaError::DuplicateColumn {
                column: column.name,
            }
            .into());
        }
        if column.is_primary_key {
            return Err(SchemaError::MultiplePrimaryKeys {
                first: self.primary_key().name.clone(),
                second: column.name,
            }
            .into());
        }
        self.index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
        Ok(())
    }
}

/// Column names are spliced into SQL text, so only plain identifiers pass.
fn check_name(name: &str) -> MappingResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidColumnName {
            column: name.to_string(),
        }
        .into())
    }
}

/// Incremental schema declaration against a [`TypeRegistry`].
///
/// Classification errors are deferred to [`SchemaBuilder::build`].
#[derive(Debug)]
pub struct SchemaBuilder<'r> {
    registry: &'r TypeRegistry,
    columns: Vec<ColumnSpec>,
    error: Option<crate::MappingError>,
}

impl<'r> SchemaBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            columns: Vec::new(),
            error: None,
        }
    }

    fn push<T: 'static>(mut self, name: impl Into<String>, primary: bool) -> Self {
        match self.registry.classify::<T>() {
            Ok(app_type) => {
                let mut column = ColumnSpec::new(name, app_type);
                column.is_primary_key = primary;
                self.columns.push(column);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    pub fn primary_key<T: 'static>(self, name: impl Into<String>) -> Self {
        self.push::<T>(name, true)
    }

    /// Mark the primary key as autoincrement.
    pub fn autoincrement(mut self) -> Self {
        if let Some(pk) = self.columns.iter_mut().find(|c| c.is_primary_key) {
            pk.autoincrement = true;
        }
        self
    }

    pub fn column<T: 'static>(self, name: impl Into<String>) -> Self {
        self.push::<T>(name, false)
    }

    pub fn build(self) -> MappingResult<Schema> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Schema::from_columns(self.columns)
    }
}
