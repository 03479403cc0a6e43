//! Logical types and the registry that classifies Rust types into them.

use crate::{MappingResult, TypeError};
use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// LOGICAL TYPES
// ============================================================================

/// Storage-relevant value kinds, independent of the host type that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Char,
    String,
    Blob,
}

impl LogicalType {
    /// Every logical type, in declaration order.
    pub const ALL: [LogicalType; 10] = [
        LogicalType::Byte,
        LogicalType::Short,
        LogicalType::Int,
        LogicalType::Long,
        LogicalType::Float,
        LogicalType::Double,
        LogicalType::Boolean,
        LogicalType::Char,
        LogicalType::String,
        LogicalType::Blob,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalType::Byte => "Byte",
            LogicalType::Short => "Short",
            LogicalType::Int => "Int",
            LogicalType::Long => "Long",
            LogicalType::Float => "Float",
            LogicalType::Double => "Double",
            LogicalType::Boolean => "Boolean",
            LogicalType::Char => "Char",
            LogicalType::String => "String",
            LogicalType::Blob => "Blob",
        }
    }

    /// Byte, Short, Int and Long.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            LogicalType::Byte | LogicalType::Short | LogicalType::Int | LogicalType::Long
        )
    }

    /// Float and Double.
    pub fn is_real(&self) -> bool {
        matches!(self, LogicalType::Float | LogicalType::Double)
    }

    /// Boolean, Char and String: stored as their textual form.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            LogicalType::Boolean | LogicalType::Char | LogicalType::String
        )
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LogicalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogicalType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid LogicalType: {}", s))
    }
}

// ============================================================================
// APPLICATION TYPES
// ============================================================================

/// A classified application type.
///
/// `boxed` separates `T` from `Option<T>`: a boxed column has no default and
/// accepts NULL as its natural empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppType {
    pub logical: LogicalType,
    pub boxed: bool,
}

impl AppType {
    pub const fn primitive(logical: LogicalType) -> Self {
        Self {
            logical,
            boxed: false,
        }
    }

    pub const fn boxed(logical: LogicalType) -> Self {
        Self {
            logical,
            boxed: true,
        }
    }

    /// Column type used in CREATE and ALTER statements.
    pub fn sql_type(&self) -> &'static str {
        match (self.logical, self.boxed) {
            (t, false) if t.is_integer() => "integer default 0",
            (t, true) if t.is_integer() => "integer",
            (t, false) if t.is_real() => "decimal default 0",
            (t, true) if t.is_real() => "decimal",
            (LogicalType::Boolean, false) => "char(5) default 'false'",
            (LogicalType::Boolean, true) => "char(5)",
            (LogicalType::Char, _) => "char(1)",
            (LogicalType::String, _) => "text",
            _ => "blob",
        }
    }
}

// ============================================================================
// TYPE REGISTRY
// ============================================================================

/// Immutable lookup from Rust types to their [`AppType`].
///
/// Built once and handed to whoever declares schemas. Only the ten scalar
/// families and their `Option` forms are registered.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: HashMap<TypeId, AppType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: HashMap::with_capacity(20),
        };
        registry.register::<i8>(LogicalType::Byte);
        registry.register::<i16>(LogicalType::Short);
        registry.register::<i32>(LogicalType::Int);
        registry.register::<i64>(LogicalType::Long);
        registry.register::<f32>(LogicalType::Float);
        registry.register::<f64>(LogicalType::Double);
        registry.register::<bool>(LogicalType::Boolean);
        registry.register::<char>(LogicalType::Char);
        registry.register::<String>(LogicalType::String);
        registry.register::<Vec<u8>>(LogicalType::Blob);
        registry
    }

    fn register<T: 'static>(&mut self, logical: LogicalType) {
        self.types
            .insert(TypeId::of::<T>(), AppType::primitive(logical));
        self.types
            .insert(TypeId::of::<Option<T>>(), AppType::boxed(logical));
    }

    /// Classify `T`, failing with `UnknownType` for anything unregistered.
    pub fn classify<T: 'static>(&self) -> MappingResult<AppType> {
        self.types.get(&TypeId::of::<T>()).copied().ok_or_else(|| {
            TypeError::UnknownType {
                type_name: type_name::<T>().to_string(),
            }
            .into()
        })
    }

    /// Number of registered type tags.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
