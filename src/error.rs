//! Error types for rowkit.
//!
//! Column-level failures carry the offending column name and the low-level cause
//! reported by the driver, so callers can tell exactly which column failed and why.

use crate::db::Value;
use std::time::Duration;
use thiserror::Error;

/// Boxed low-level cause attached to column errors.
pub type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for rowkit operations.
#[derive(Error, Debug)]
pub enum RowkitError {
    /// The stored value cannot be converted to the requested type.
    #[error("Column '{column}' cannot be read as {expected}")]
    ColumnTypeMismatch {
        column: String,
        expected: &'static str,
        #[source]
        source: BoxDynError,
    },

    /// A mandatory accessor hit a NULL value.
    #[error("Column '{column}' is null")]
    ColumnNull {
        column: String,
        #[source]
        source: BoxDynError,
    },

    /// The column name is not part of the current row's schema.
    #[error("Unknown column '{column}'")]
    UnknownColumn {
        column: String,
        #[source]
        source: BoxDynError,
    },

    /// Two batched result sets bind the same parameter to different values.
    #[error("Parameter '{name}' is bound to conflicting values ({first} vs {second})")]
    ParameterConflict {
        name: String,
        first: Value,
        second: Value,
    },

    /// The combined statement produced fewer result sets than were requested.
    #[error("Expected {expected} result sets but the statement produced {actual}")]
    ResultSetCountMismatch { expected: usize, actual: usize },

    /// The statement did not complete within the per-call timeout.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// Connection errors raised outside the sqlx driver.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (cursor misuse, unexpected states).
    #[error("Internal error: {0}")]
    Internal(String),

    /// Driver errors, passed through as reported.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RowkitError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Creates an unknown-column error wrapping the driver's lookup failure.
    pub fn unknown_column(column: impl Into<String>, source: impl Into<BoxDynError>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            source: source.into(),
        }
    }

    /// Returns the column or parameter name this error refers to, if any.
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::ColumnTypeMismatch { column, .. }
            | Self::ColumnNull { column, .. }
            | Self::UnknownColumn { column, .. } => Some(column),
            Self::ParameterConflict { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::ColumnTypeMismatch { .. } => "Column Type Mismatch",
            Self::ColumnNull { .. } => "Column Null",
            Self::UnknownColumn { .. } => "Unknown Column",
            Self::ParameterConflict { .. } => "Parameter Conflict",
            Self::ResultSetCountMismatch { .. } => "Result Set Count Mismatch",
            Self::Timeout(_) => "Timeout",
            Self::Connection(_) => "Connection Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
            Self::Database(_) => "Database Error",
        }
    }
}

/// Result type alias using RowkitError.
pub type Result<T> = std::result::Result<T, RowkitError>;
