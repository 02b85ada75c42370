//! Driver capabilities consumed by the typed access layer.
//!
//! The layer never talks to a database directly. It asks a [`Connection`] to
//! execute a statement and reads the resulting [`RawCursor`], or hands a
//! [`VirtualCursor`](crate::bulk::VirtualCursor) to a [`BulkLoad`] sink. Two drivers
//! implement these traits: SQLite via sqlx, and an in-memory scripted driver.

mod memory;
mod sqlite;
mod types;

pub use memory::{ExecutedStatement, MemoryConnection, MemoryDatabase, ResultSet};
pub use types::{CursorError, Parameter, Value, ValueError, DATETIME_FORMAT};

use crate::bulk::VirtualCursor;
use crate::error::{BoxDynError, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
        }
    }
}

/// A forward-only cursor over one or more result sets.
///
/// Exactly one row is visible at a time. `read` moves within the current result
/// set; `next_result` moves to the following one.
#[async_trait]
pub trait RawCursor: Send {
    /// Advances to the next row of the current result set.
    ///
    /// Returns `false` once the current result set is exhausted.
    async fn read(&mut self) -> Result<bool>;

    /// Skips any unread rows and advances to the next result set.
    ///
    /// Returns `false` when the statement produced no further result sets.
    async fn next_result(&mut self) -> Result<bool>;

    /// Resolves a column name to its ordinal in the current row.
    fn ordinal(&self, name: &str) -> std::result::Result<usize, BoxDynError>;

    /// Reads the value at `ordinal` from the current row.
    fn value(&self, ordinal: usize) -> std::result::Result<Value, BoxDynError>;
}

/// An open connection able to execute statements with named parameters.
#[async_trait]
pub trait Connection: Send {
    /// Rewrites named parameter markers in `sql` into the driver's native form.
    fn native_sql(&self, sql: &str, _params: &[Parameter]) -> String {
        sql.to_string()
    }

    /// Executes `sql` and returns a cursor positioned before the first row of the
    /// first result set. The statement text must be in native form.
    async fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Parameter],
        timeout: Duration,
    ) -> Result<Box<dyn RawCursor + 'c>>;
}

#[async_trait]
impl<C: Connection + ?Sized> Connection for &mut C {
    fn native_sql(&self, sql: &str, params: &[Parameter]) -> String {
        (**self).native_sql(sql, params)
    }

    async fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Parameter],
        timeout: Duration,
    ) -> Result<Box<dyn RawCursor + 'c>> {
        (**self).execute(sql, params, timeout).await
    }
}

/// Maps one source column of a virtual cursor to one destination column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub source: String,
    pub destination: String,
}

impl ColumnMapping {
    /// Maps a column to the destination column of the same name.
    pub fn identity(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            source: name.clone(),
            destination: name,
        }
    }
}

/// Options for a bulk load operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkLoadOptions {
    /// Hold a lock on the destination table for the whole load.
    pub table_lock: bool,
    /// `None` means the load may run for as long as it needs.
    pub timeout: Option<Duration>,
}

impl Default for BulkLoadOptions {
    fn default() -> Self {
        Self {
            table_lock: true,
            timeout: None,
        }
    }
}

/// Describes where and how a bulk load writes.
#[derive(Debug, Clone)]
pub struct BulkLoadRequest<'a> {
    pub table: &'a str,
    pub mappings: Vec<ColumnMapping>,
    pub options: BulkLoadOptions,
}

/// A server-side fast path that loads rows pulled from a virtual cursor.
#[async_trait]
pub trait BulkLoad: Send {
    /// Streams every row of `source` into the destination table and returns the
    /// number of rows written.
    async fn bulk_load(
        &mut self,
        request: BulkLoadRequest<'_>,
        source: &mut (dyn VirtualCursor + '_),
    ) -> Result<u64>;
}

#[async_trait]
impl<C: BulkLoad + ?Sized> BulkLoad for &mut C {
    async fn bulk_load(
        &mut self,
        request: BulkLoadRequest<'_>,
        source: &mut (dyn VirtualCursor + '_),
    ) -> Result<u64> {
        (**self).bulk_load(request, source).await
    }
}

/// Something a connection can be obtained from for the duration of one call.
///
/// Descriptors and pools hand out a connection scoped to the call; an already
/// open connection or transaction is lent as-is and stays open afterwards.
#[async_trait]
pub trait ConnectionSource: Send {
    type Connection: Send;

    /// Obtains the connection used for one call.
    ///
    /// Scoped connections are released when the returned value is dropped, which
    /// happens on every exit path of the call.
    async fn acquire(self) -> Result<Self::Connection>;
}

#[async_trait]
impl<'a, C: Connection + ?Sized> ConnectionSource for &'a mut C {
    type Connection = &'a mut C;

    async fn acquire(self) -> Result<Self::Connection> {
        Ok(self)
    }
}
