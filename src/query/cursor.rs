//! Typed, fail-fast column access over a raw cursor.
//!
//! Every accessor resolves the column ordinal by name at call time, reads the raw
//! value, and converts it to the requested type. Failures name the column and
//! wrap the driver-level cause.

use crate::db::{RawCursor, Value, ValueError, DATETIME_FORMAT};
use crate::error::{Result, RowkitError};
use chrono::{DateTime, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// Conversion from a non-null [`Value`] into a Rust type.
pub trait FromValue: Sized {
    /// Type name used in error messages.
    const EXPECTED: &'static str;

    fn from_value(value: Value) -> std::result::Result<Self, ValueError>;
}

fn mismatch<T: FromValue>(value: &Value) -> ValueError {
    ValueError::Mismatch {
        expected: T::EXPECTED,
        found: value.kind(),
    }
}

impl FromValue for i32 {
    const EXPECTED: &'static str = "i32";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| ValueError::OutOfRange {
                expected: Self::EXPECTED,
                value: i.to_string(),
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "i64";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "f64";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    // SQLite has no boolean storage class, so 0/1 integers are accepted.
    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            Value::Int(i) => Err(ValueError::OutOfRange {
                expected: Self::EXPECTED,
                value: i.to_string(),
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for Decimal {
    const EXPECTED: &'static str = "decimal";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Decimal(d) => Ok(d),
            Value::Int(i) => Ok(Decimal::from(i)),
            Value::Float(f) => Decimal::try_from(f).map_err(|e| ValueError::Parse {
                expected: Self::EXPECTED,
                value: f.to_string(),
                reason: e.to_string(),
            }),
            Value::String(s) => Decimal::from_str(s.trim()).map_err(|e| ValueError::Parse {
                expected: Self::EXPECTED,
                reason: e.to_string(),
                value: s,
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    const EXPECTED: &'static str = "datetime";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::DateTime(dt) => Ok(dt),
            Value::String(s) => parse_datetime(&s).ok_or_else(|| ValueError::Parse {
                expected: Self::EXPECTED,
                value: s,
                reason: "unrecognized date-time layout".to_string(),
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Parses the date-time layouts SQLite and ISO 8601 producers commonly write.
fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

impl FromValue for Uuid {
    const EXPECTED: &'static str = "uuid";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::String(s) => Uuid::parse_str(s.trim()).map_err(|e| ValueError::Parse {
                expected: Self::EXPECTED,
                reason: e.to_string(),
                value: s,
            }),
            Value::Bytes(b) => Uuid::from_slice(&b).map_err(|e| ValueError::Parse {
                expected: Self::EXPECTED,
                value: format!("<{} bytes>", b.len()),
                reason: e.to_string(),
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromValue for char {
    const EXPECTED: &'static str = "char";

    fn from_value(value: Value) -> std::result::Result<Self, ValueError> {
        match value {
            Value::String(s) => s.chars().next().ok_or(ValueError::Parse {
                expected: Self::EXPECTED,
                value: s.clone(),
                reason: "text is empty".to_string(),
            }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

/// Typed accessors over the current row of a [`RawCursor`].
///
/// Holds only a borrow of the raw cursor and cannot outlive it. Create one per
/// row-iteration loop.
pub struct TypedCursor<'a> {
    raw: &'a mut dyn RawCursor,
}

impl<'a> TypedCursor<'a> {
    pub fn new(raw: &'a mut dyn RawCursor) -> Self {
        Self { raw }
    }

    /// Advances to the next row of the current result set.
    pub async fn read(&mut self) -> Result<bool> {
        self.raw.read().await
    }

    /// Advances to the next result set.
    pub async fn next_result(&mut self) -> Result<bool> {
        self.raw.next_result().await
    }

    /// Reads a column, failing with `ColumnNull` when it holds NULL.
    pub fn get<T: FromValue>(&self, column: &str) -> Result<T> {
        match self.get_optional(column)? {
            Some(value) => Ok(value),
            None => Err(RowkitError::ColumnNull {
                column: column.to_string(),
                source: Box::new(ValueError::UnexpectedNull {
                    expected: T::EXPECTED,
                }),
            }),
        }
    }

    /// Reads a column, returning `None` when it holds NULL.
    pub fn get_optional<T: FromValue>(&self, column: &str) -> Result<Option<T>> {
        let ordinal = self
            .raw
            .ordinal(column)
            .map_err(|source| RowkitError::unknown_column(column, source))?;

        let value = self
            .raw
            .value(ordinal)
            .map_err(|source| RowkitError::ColumnTypeMismatch {
                column: column.to_string(),
                expected: T::EXPECTED,
                source,
            })?;

        if value.is_null() {
            return Ok(None);
        }

        T::from_value(value)
            .map(Some)
            .map_err(|e| RowkitError::ColumnTypeMismatch {
                column: column.to_string(),
                expected: T::EXPECTED,
                source: Box::new(e),
            })
    }

    /// Reads the raw value of a column without conversion.
    pub fn value(&self, column: &str) -> Result<Value> {
        let ordinal = self
            .raw
            .ordinal(column)
            .map_err(|source| RowkitError::unknown_column(column, source))?;
        self.raw
            .value(ordinal)
            .map_err(|source| RowkitError::ColumnTypeMismatch {
                column: column.to_string(),
                expected: "value",
                source,
            })
    }

    pub fn char(&self, column: &str) -> Result<char> {
        self.get(column)
    }

    pub fn optional_char(&self, column: &str) -> Result<Option<char>> {
        self.get_optional(column)
    }

    pub fn i32(&self, column: &str) -> Result<i32> {
        self.get(column)
    }

    pub fn optional_i32(&self, column: &str) -> Result<Option<i32>> {
        self.get_optional(column)
    }

    pub fn i64(&self, column: &str) -> Result<i64> {
        self.get(column)
    }

    pub fn optional_i64(&self, column: &str) -> Result<Option<i64>> {
        self.get_optional(column)
    }

    pub fn decimal(&self, column: &str) -> Result<Decimal> {
        self.get(column)
    }

    pub fn optional_decimal(&self, column: &str) -> Result<Option<Decimal>> {
        self.get_optional(column)
    }

    pub fn datetime(&self, column: &str) -> Result<NaiveDateTime> {
        self.get(column)
    }

    pub fn optional_datetime(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        self.get_optional(column)
    }

    pub fn bool(&self, column: &str) -> Result<bool> {
        self.get(column)
    }

    pub fn optional_bool(&self, column: &str) -> Result<Option<bool>> {
        self.get_optional(column)
    }

    pub fn f64(&self, column: &str) -> Result<f64> {
        self.get(column)
    }

    pub fn optional_f64(&self, column: &str) -> Result<Option<f64>> {
        self.get_optional(column)
    }

    pub fn uuid(&self, column: &str) -> Result<Uuid> {
        self.get(column)
    }

    pub fn optional_uuid(&self, column: &str) -> Result<Option<Uuid>> {
        self.get_optional(column)
    }

    pub fn string(&self, column: &str) -> Result<String> {
        self.get(column)
    }

    pub fn optional_string(&self, column: &str) -> Result<Option<String>> {
        self.get_optional(column)
    }
}
