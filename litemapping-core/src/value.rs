//! Application values and the storage-native cells they become.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// APPLICATION VALUES
// ============================================================================

/// A typed application value, one variant per logical type plus `Null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    Char(char),
    Text(String),
    Blob(Vec<u8>),
}

/// A numeric value in its widest form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Real(f64),
}

impl Numeric {
    pub fn to_i64(self) -> i64 {
        match self {
            Numeric::Integer(i) => i,
            Numeric::Real(r) => r as i64,
        }
    }

    pub fn to_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Real(r) => r,
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Boolean(_) => "boolean",
            Value::Char(_) => "char",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }

    /// The value as a number, if it is one.
    pub fn as_numeric(&self) -> Option<Numeric> {
        match self {
            Value::Byte(v) => Some(Numeric::Integer(*v as i64)),
            Value::Short(v) => Some(Numeric::Integer(*v as i64)),
            Value::Int(v) => Some(Numeric::Integer(*v as i64)),
            Value::Long(v) => Some(Numeric::Integer(*v)),
            Value::Float(v) => Some(Numeric::Real(*v as f64)),
            Value::Double(v) => Some(Numeric::Real(*v)),
            _ => None,
        }
    }

    /// Textual form used for text cells and selection arguments.
    ///
    /// `None` for `Null` and `Blob`, which have no textual form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null | Value::Blob(_) => None,
            Value::Byte(v) => Some(v.to_string()),
            Value::Short(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Long(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::Double(v) => Some(v.to_string()),
            Value::Boolean(v) => Some(v.to_string()),
            Value::Char(v) => Some(v.to_string()),
            Value::Text(v) => Some(v.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Blob(bytes) => write!(f, "<{} bytes>", bytes.len()),
            other => write!(f, "{}", other.to_text().unwrap_or_default()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    bool => Boolean,
    char => Char,
    String => Text,
    Vec<u8> => Blob,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// STORAGE CELLS
// ============================================================================

/// A storage-native cell, ready to be bound into a write statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    Null,
    Int32(i32),
    Int64(i64),
    Real32(f32),
    Real64(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// A cell as reported by a row cursor, in the engine's native storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl RawCell {
    pub fn is_null(&self) -> bool {
        matches!(self, RawCell::Null)
    }

    /// 64-bit integer accessor. Text is parsed leniently; anything unparseable reads as 0.
    pub fn as_i64(&self) -> i64 {
        match self {
            RawCell::Null => 0,
            RawCell::Integer(i) => *i,
            RawCell::Real(r) => *r as i64,
            RawCell::Text(s) => parse_integer(s),
            RawCell::Blob(b) => parse_integer(&String::from_utf8_lossy(b)),
        }
    }

    /// 32-bit integer accessor: the 64-bit value truncated to its low 32 bits.
    pub fn as_i32(&self) -> i32 {
        self.as_i64() as i32
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            RawCell::Null => 0.0,
            RawCell::Integer(i) => *i as f64,
            RawCell::Real(r) => *r,
            RawCell::Text(s) => s.trim().parse().unwrap_or(0.0),
            RawCell::Blob(b) => String::from_utf8_lossy(b).trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_f32(&self) -> f32 {
        self.as_f64() as f32
    }

    pub fn as_text(&self) -> String {
        match self {
            RawCell::Null => String::new(),
            RawCell::Integer(i) => i.to_string(),
            RawCell::Real(r) => r.to_string(),
            RawCell::Text(s) => s.clone(),
            RawCell::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    pub fn as_blob(&self) -> Vec<u8> {
        match self {
            RawCell::Null => Vec::new(),
            RawCell::Blob(b) => b.clone(),
            other => other.as_text().into_bytes(),
        }
    }
}

impl From<StorageValue> for RawCell {
    fn from(v: StorageValue) -> Self {
        match v {
            StorageValue::Null => RawCell::Null,
            StorageValue::Int32(i) => RawCell::Integer(i as i64),
            StorageValue::Int64(i) => RawCell::Integer(i),
            StorageValue::Real32(r) => RawCell::Real(r as f64),
            StorageValue::Real64(r) => RawCell::Real(r),
            StorageValue::Text(s) => RawCell::Text(s),
            StorageValue::Blob(b) => RawCell::Blob(b),
        }
    }
}

fn parse_integer(s: &str) -> i64 {
    let s = s.trim();
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|r| r as i64))
        .unwrap_or(0)
}
