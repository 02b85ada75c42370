//! Value and parameter types shared by drivers and the typed access layer.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Canonical text layout for date-time values stored as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Represents a single value read from, or bound to, the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// High-precision decimal.
    Decimal(Decimal),

    /// Date and time without a time zone.
    DateTime(NaiveDateTime),

    /// Unique identifier.
    Uuid(Uuid),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the name of the value's kind, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::Float(_) => "REAL",
            Value::Decimal(_) => "DECIMAL",
            Value::DateTime(_) => "DATETIME",
            Value::Uuid(_) => "UUID",
            Value::String(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
            Value::Uuid(u) => u.hyphenated().to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// A named statement parameter.
///
/// Names are stored without their `@`, `:` or `$` marker, so `"@id"` and `"id"`
/// refer to the same parameter. Comparison is case-sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    /// Creates a parameter, stripping any leading placeholder marker from the name.
    pub fn new(name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        let name = name.as_ref();
        let name = name.strip_prefix(&['@', ':', '$'][..]).unwrap_or(name);
        Self {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// Conversion failure between a stored value and a requested Rust type.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("unexpected NULL where {expected} was required")]
    UnexpectedNull { expected: &'static str },

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{value} is out of range for {expected}")]
    OutOfRange { expected: &'static str, value: String },

    #[error("cannot parse {value:?} as {expected}: {reason}")]
    Parse {
        expected: &'static str,
        value: String,
        reason: String,
    },
}

/// Low-level failures raised by a raw cursor.
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("no column named '{0}' in the current result set")]
    ColumnNotFound(String),

    #[error("column ordinal {index} is out of range for {len} columns")]
    OrdinalOutOfRange { index: usize, len: usize },

    #[error("cursor is not positioned on a row")]
    NoCurrentRow,
}
