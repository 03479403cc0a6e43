//! Bidirectional coercion between application values and storage cells.
//!
//! Writes are strict: a column missing from the schema or a value that cannot
//! become the column's logical type is an error. Reads are permissive: a
//! column the schema does not know is reported as [`Decoded::Skip`] so the
//! marshaller can drop it.

use crate::{LogicalType, MappingResult, RawCell, Schema, StorageValue, TypeError, Value};

/// Outcome of decoding a single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Value(Value),
    /// The column is not part of the schema; omit it from the row.
    Skip,
}

/// Converts values against the column types of one schema.
#[derive(Debug, Clone, Copy)]
pub struct Coercer<'s> {
    schema: &'s Schema,
}

impl<'s> Coercer<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Convert an application value into the cell written for `column`.
    pub fn to_storage_value(&self, column: &str, value: &Value) -> MappingResult<StorageValue> {
        if value.is_null() {
            return Ok(StorageValue::Null);
        }
        let spec = self
            .schema
            .column(column)
            .ok_or_else(|| TypeError::UnknownColumn {
                column: column.to_string(),
            })?;
        let logical = spec.logical_type();
        let mismatch = || TypeError::TypeMismatch {
            column: column.to_string(),
            expected: logical,
            found: value.kind().to_string(),
        };

        let cell = match logical {
            LogicalType::Byte => {
                let n = value.as_numeric().ok_or_else(mismatch)?;
                StorageValue::Int32(n.to_i64() as i8 as i32)
            }
            LogicalType::Short => {
                let n = value.as_numeric().ok_or_else(mismatch)?;
                StorageValue::Int32(n.to_i64() as i16 as i32)
            }
            LogicalType::Int => {
                let n = value.as_numeric().ok_or_else(mismatch)?;
                StorageValue::Int32(n.to_i64() as i32)
            }
            LogicalType::Long => {
                let n = value.as_numeric().ok_or_else(mismatch)?;
                StorageValue::Int64(n.to_i64())
            }
            LogicalType::Float => {
                let n = value.as_numeric().ok_or_else(mismatch)?;
                StorageValue::Real32(n.to_f64() as f32)
            }
            LogicalType::Double => {
                let n = value.as_numeric().ok_or_else(mismatch)?;
                StorageValue::Real64(n.to_f64())
            }
            LogicalType::Boolean | LogicalType::Char | LogicalType::String => {
                StorageValue::Text(value.to_text().ok_or_else(mismatch)?)
            }
            LogicalType::Blob => match value {
                Value::Blob(bytes) => StorageValue::Blob(bytes.clone()),
                _ => return Err(mismatch().into()),
            },
        };
        Ok(cell)
    }

    /// Read a raw cell reported for `column`.
    pub fn from_storage_value(&self, column: &str, cell: &RawCell) -> MappingResult<Decoded> {
        let Some(spec) = self.schema.column(column) else {
            return Ok(Decoded::Skip);
        };
        if cell.is_null() {
            return Ok(Decoded::Value(Value::Null));
        }

        let value = match spec.logical_type() {
            LogicalType::Byte => Value::Byte(cell.as_i32() as i8),
            LogicalType::Short => Value::Short(cell.as_i32() as i16),
            LogicalType::Int => Value::Int(cell.as_i32()),
            LogicalType::Long => Value::Long(cell.as_i64()),
            LogicalType::Float => Value::Float(cell.as_f32()),
            LogicalType::Double => Value::Double(cell.as_f64()),
            LogicalType::Boolean => Value::Boolean(cell.as_text().eq_ignore_ascii_case("true")),
            LogicalType::Char => {
                let text = cell.as_text();
                let first = text.chars().next().ok_or_else(|| TypeError::TypeMismatch {
                    column: column.to_string(),
                    expected: LogicalType::Char,
                    found: "empty text".to_string(),
                })?;
                Value::Char(first)
            }
            LogicalType::String => Value::Text(cell.as_text()),
            LogicalType::Blob => Value::Blob(cell.as_blob()),
        };
        Ok(Decoded::Value(value))
    }
}
