//! Query arguments and the clause compiler.
//!
//! A [`QueryArgument`] compiles into four SQL fragments: the selection clause
//! with its positional arguments, the ORDER BY fragment and the LIMIT fragment.
//!
//! ```text
//! selection := <key> <op> ? [ (and|or) <key> <op> ? ]*
//! order     := <column> [asc|desc]
//! limit     := <page_size> | <offset>, <page_size>
//! ```

use crate::{LogicalType, MappingResult, QueryError, Schema, TypeError, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// CONDITIONS
// ============================================================================

/// Comparison operator of a single condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    LessThan,
    LessThanOrEqualTo,
    EqualTo,
    GreaterThanOrEqualTo,
    GreaterThan,
    NotEqualTo,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEqualTo => "<=",
            CompareOp::EqualTo => "=",
            CompareOp::GreaterThanOrEqualTo => ">=",
            CompareOp::GreaterThan => ">",
            CompareOp::NotEqualTo => "!=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Operator placed between every pair of conditions of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConditionLink {
    #[default]
    And,
    Or,
}

impl ConditionLink {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ConditionLink::And => "and",
            ConditionLink::Or => "or",
        }
    }
}

/// A single `<key> <op> ?` filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub compare: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(key: impl Into<String>, compare: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            compare,
            value: value.into(),
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::EqualTo, value)
    }

    pub fn ne(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::NotEqualTo, value)
    }

    pub fn lt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::LessThan, value)
    }

    pub fn le(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::LessThanOrEqualTo, value)
    }

    pub fn gt(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::GreaterThan, value)
    }

    pub fn ge(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, CompareOp::GreaterThanOrEqualTo, value)
    }
}

// ============================================================================
// QUERY ARGUMENT
// ============================================================================

/// Filter, ordering and pagination for one read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryArgument {
    pub conditions: Vec<Condition>,
    pub link: ConditionLink,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub order_column: Option<String>,
    pub reverse: Option<bool>,
}

impl QueryArgument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter on a single condition.
    pub fn set_condition(self, condition: Condition) -> Self {
        self.set_conditions(vec![condition], ConditionLink::And)
    }

    pub fn set_conditions(mut self, conditions: Vec<Condition>, link: ConditionLink) -> Self {
        self.conditions = conditions;
        self.link = link;
        self
    }

    pub fn set_page_and_size(mut self, page: u32, page_size: u32) -> Self {
        self.page = Some(page);
        self.page_size = Some(page_size);
        self
    }

    /// Cap the number of rows without an offset.
    pub fn set_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Order ascending by `column`.
    pub fn set_order_by(self, column: impl Into<String>) -> Self {
        self.set_order_by_reverse(column, false)
    }

    pub fn set_order_by_reverse(mut self, column: impl Into<String>, reverse: bool) -> Self {
        self.order_column = Some(column.into());
        self.reverse = Some(reverse);
        self
    }

    /// Validate against `schema` and compile into SQL fragments.
    ///
    /// Condition keys and the order column are interpolated into SQL, so both
    /// must name schema columns.
    pub fn compile(&self, schema: &Schema) -> MappingResult<CompiledQuery> {
        let known = |column: &str| -> MappingResult<()> {
            if schema.contains(column) {
                Ok(())
            } else {
                Err(TypeError::UnknownColumn {
                    column: column.to_string(),
                }
                .into())
            }
        };
        for condition in &self.conditions {
            known(&condition.key)?;
        }
        if let Some(column) = &self.order_column {
            known(column)?;
        }

        let selection = compile_selection(&self.conditions, self.link)?;
        Ok(CompiledQuery {
            selection,
            order_by: compile_order(self.order_column.as_deref(), self.reverse),
            limit: compile_pagination(self.page, self.page_size)?,
        })
    }
}

// ============================================================================
// COMPILER
// ============================================================================

/// WHERE-equivalent clause and its positional arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub clause: Option<String>,
    pub args: Vec<String>,
}

impl Selection {
    /// `<column> = ?` bound to a single value, as used for primary-key lookups.
    pub fn by_key(column: &str, value: &Value) -> MappingResult<Self> {
        Ok(Self {
            clause: Some(format!("{} = ?", column)),
            args: vec![argument_text(column, value)?],
        })
    }
}

/// All fragments of a compiled [`QueryArgument`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledQuery {
    pub selection: Selection,
    pub order_by: Option<String>,
    pub limit: Option<String>,
}

/// Textual argument form of a condition value.
///
/// Null becomes the empty string. That compares as `''`, not as SQL NULL;
/// existing callers depend on it, so it stays.
fn argument_text(key: &str, value: &Value) -> MappingResult<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Blob(_) => Err(TypeError::TypeMismatch {
            column: key.to_string(),
            expected: LogicalType::String,
            found: value.kind().to_string(),
        }
        .into()),
        other => Ok(other.to_text().unwrap_or_default()),
    }
}

/// Join conditions with `link`, one `?` per condition.
pub fn compile_selection(
    conditions: &[Condition],
    link: ConditionLink,
) -> MappingResult<Selection> {
    if conditions.is_empty() {
        return Ok(Selection::default());
    }
    let separator = format!(" {} ", link.as_sql());
    let mut args = Vec::with_capacity(conditions.len());
    let mut parts = Vec::with_capacity(conditions.len());
    for condition in conditions {
        parts.push(format!("{} {} ?", condition.key, condition.compare));
        args.push(argument_text(&condition.key, &condition.value)?);
    }
    Ok(Selection {
        clause: Some(parts.join(&separator)),
        args,
    })
}

/// ORDER BY fragment. Without a direction the column is emitted bare.
pub fn compile_order(column: Option<&str>, reverse: Option<bool>) -> Option<String> {
    let column = column?;
    match reverse {
        None => Some(column.to_string()),
        Some(reverse) => Some(format!(
            "{} {}",
            column,
            if reverse { "desc" } else { "asc" }
        )),
    }
}

/// LIMIT fragment: a bare row cap, or `<offset>, <page_size>`.
pub fn compile_pagination(
    page: Option<u32>,
    page_size: Option<u32>,
) -> MappingResult<Option<String>> {
    match (page, page_size) {
        (None, None) => Ok(None),
        (None, Some(size)) => Ok(Some(size.to_string())),
        (Some(page), Some(size)) => {
            let offset = page as u64 * size as u64;
            Ok(Some(format!("{}, {}", offset, size)))
        }
        (Some(page), None) => Err(QueryError::InvalidPagination { page }.into()),
    }
}
