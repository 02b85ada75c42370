//! SQLite driver implementation.
//!
//! Implements the connection, cursor and bulk-load capabilities for sqlx's SQLite
//! connections, pool connections and transactions. Statements stream through
//! `fetch_many`; each statement-completion marker ends one result set.

use crate::bulk::VirtualCursor;
use crate::config::ConnectionConfig;
use crate::db::{
    BulkLoad, BulkLoadRequest, ColumnMapping, Connection, ConnectionSource, CursorError,
    Parameter, RawCursor, Value, DATETIME_FORMAT,
};
use crate::error::{BoxDynError, Result, RowkitError};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnection, SqlitePool, SqliteQueryResult, SqliteRow,
};
use sqlx::{Column as SqlxColumn, Either, Row as SqlxRow, Transaction, TypeInfo, ValueRef};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

type RowStream<'c> =
    BoxStream<'c, std::result::Result<Either<SqliteQueryResult, SqliteRow>, sqlx::Error>>;

#[async_trait]
impl Connection for SqliteConnection {
    fn native_sql(&self, sql: &str, params: &[Parameter]) -> String {
        rewrite_named_parameters(sql, params)
    }

    async fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Parameter],
        timeout: Duration,
    ) -> Result<Box<dyn RawCursor + 'c>> {
        debug!(
            "Executing statement ({} bytes, {} parameters, timeout {:?})",
            sql.len(),
            params.len(),
            timeout
        );

        let query = params
            .iter()
            .fold(sqlx::query(sql), |query, param| {
                bind_value(query, param.value.clone())
            });

        // Multiple statements in one prepared query is SQLite-only behavior.
        #[allow(deprecated)]
        let stream = query.fetch_many(self);

        Ok(Box::new(SqliteCursor::new(stream, timeout)))
    }
}

#[async_trait]
impl Connection for PoolConnection<Sqlite> {
    fn native_sql(&self, sql: &str, params: &[Parameter]) -> String {
        rewrite_named_parameters(sql, params)
    }

    async fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Parameter],
        timeout: Duration,
    ) -> Result<Box<dyn RawCursor + 'c>> {
        Connection::execute(&mut **self, sql, params, timeout).await
    }
}

#[async_trait]
impl<'t> Connection for Transaction<'t, Sqlite> {
    fn native_sql(&self, sql: &str, params: &[Parameter]) -> String {
        rewrite_named_parameters(sql, params)
    }

    async fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Parameter],
        timeout: Duration,
    ) -> Result<Box<dyn RawCursor + 'c>> {
        Connection::execute(&mut **self, sql, params, timeout).await
    }
}

#[async_trait]
impl<'a> ConnectionSource for &'a SqlitePool {
    type Connection = PoolConnection<Sqlite>;

    async fn acquire(self) -> Result<Self::Connection> {
        Ok(SqlitePool::acquire(self).await?)
    }
}

#[async_trait]
impl<'a> ConnectionSource for &'a ConnectionConfig {
    type Connection = SqliteConnection;

    async fn acquire(self) -> Result<Self::Connection> {
        let options = self.connect_options()?;
        debug!("Opening connection to {}", self.display_string());
        Ok(<SqliteConnection as sqlx::Connection>::connect_with(&options).await?)
    }
}

#[async_trait]
impl BulkLoad for SqliteConnection {
    async fn bulk_load(
        &mut self,
        request: BulkLoadRequest<'_>,
        source: &mut (dyn VirtualCursor + '_),
    ) -> Result<u64> {
        match request.options.timeout {
            Some(limit) => tokio::time::timeout(limit, load_rows(self, &request, source))
                .await
                .map_err(|_| RowkitError::Timeout(limit))?,
            None => load_rows(self, &request, source).await,
        }
    }
}

#[async_trait]
impl BulkLoad for PoolConnection<Sqlite> {
    async fn bulk_load(
        &mut self,
        request: BulkLoadRequest<'_>,
        source: &mut (dyn VirtualCursor + '_),
    ) -> Result<u64> {
        BulkLoad::bulk_load(&mut **self, request, source).await
    }
}

#[async_trait]
impl<'t> BulkLoad for Transaction<'t, Sqlite> {
    async fn bulk_load(
        &mut self,
        request: BulkLoadRequest<'_>,
        source: &mut (dyn VirtualCursor + '_),
    ) -> Result<u64> {
        BulkLoad::bulk_load(&mut **self, request, source).await
    }
}

/// Inserts every row of `source` inside one transaction.
///
/// SQLite locks the whole database for writing, so the transaction's write lock
/// covers the table lock requested by `table_lock`. Inside an outer transaction
/// this becomes a savepoint. Dropping the transaction on error rolls it back.
async fn load_rows(
    conn: &mut SqliteConnection,
    request: &BulkLoadRequest<'_>,
    source: &mut (dyn VirtualCursor + '_),
) -> Result<u64> {
    let ordinals = request
        .mappings
        .iter()
        .map(|m| source.ordinal(&m.source))
        .collect::<Result<Vec<_>>>()?;
    let sql = insert_statement(request.table, &request.mappings);

    let mut tx = sqlx::Connection::begin(conn).await?;
    let mut loaded = 0u64;

    while source.read() {
        let mut query = sqlx::query(&sql);
        for &ordinal in &ordinals {
            query = bind_value(query, source.value(ordinal)?);
        }
        query.execute(&mut *tx).await?;
        loaded += 1;
    }

    tx.commit().await?;
    source.close();

    debug!("Bulk loaded {} rows into {}", loaded, request.table);
    Ok(loaded)
}

fn insert_statement(table: &str, mappings: &[ColumnMapping]) -> String {
    let columns = mappings
        .iter()
        .map(|m| quote_identifier(&m.destination))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=mappings.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({columns}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

/// Quotes each dot-separated part of an identifier.
fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Binds a value using SQLite's native storage classes.
///
/// Decimals, date-times and UUIDs have no storage class of their own and are
/// bound as text.
fn bind_value(query: SqliteQuery<'_>, value: Value) -> SqliteQuery<'_> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::DateTime(dt) => query.bind(dt.format(DATETIME_FORMAT).to_string()),
        Value::Uuid(u) => query.bind(u.hyphenated().to_string()),
        Value::String(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
    }
}

/// Rewrites `@name`, `:name` and `$name` markers into SQLite's absolute `?N` form,
/// where N is the 1-based position of the parameter in `params`.
///
/// Markers inside string literals, quoted identifiers and comments are left alone,
/// as are names that match no parameter.
fn rewrite_named_parameters(sql: &str, params: &[Parameter]) -> String {
    if params.is_empty() {
        return sql.to_string();
    }

    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => i = skip_past(bytes, i + 1, quote),
            b'[' => i = skip_past(bytes, i + 1, b']'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => i = skip_past(bytes, i + 2, b'\n'),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i + 2),
            b'@' | b':' | b'$' => {
                let len = identifier_len(&bytes[i + 1..]);
                let name = &sql[i + 1..i + 1 + len];
                let index = params.iter().position(|p| len > 0 && p.name == name);
                if let Some(index) = index {
                    out.push_str(&sql[copied..i]);
                    out.push_str(&format!("?{}", index + 1));
                    copied = i + 1 + len;
                }
                i += 1 + len;
            }
            _ => i += 1,
        }
    }

    out.push_str(&sql[copied..]);
    out
}

/// Returns the index just past the next `delimiter` at or after `from`.
fn skip_past(bytes: &[u8], from: usize, delimiter: u8) -> usize {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == delimiter)
        .map_or(bytes.len(), |offset| from + offset + 1)
}

fn skip_block_comment(bytes: &[u8], from: usize) -> usize {
    bytes[from.min(bytes.len())..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len(), |offset| from + offset + 2)
}

fn identifier_len(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => bytes
            .iter()
            .take_while(|b| b.is_ascii_alphanumeric() || **b == b'_')
            .count(),
        _ => 0,
    }
}

/// Where the cursor stands relative to the statement's result sets.
enum Position {
    /// Inside a result set; the next stream item is a row or its end marker.
    InRows,
    /// A result set was entered by peeking; its first row has not been read yet.
    Pending(SqliteRow),
    /// The current result set has been read to its end.
    EndOfSet,
    /// The statement produced no further items.
    Exhausted,
}

/// Computes a deadline, saturating for timeouts too large to represent.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(60 * 60 * 24 * 365))
}

/// Forward-only cursor over the result sets of one SQLite execution.
pub struct SqliteCursor<'c> {
    stream: RowStream<'c>,
    position: Position,
    row: Option<SqliteRow>,
    deadline: Instant,
    timeout: Duration,
}

impl<'c> SqliteCursor<'c> {
    fn new(stream: RowStream<'c>, timeout: Duration) -> Self {
        Self {
            stream,
            position: Position::InRows,
            row: None,
            deadline: deadline_after(timeout),
            timeout,
        }
    }

    async fn pull(&mut self) -> Result<Option<Either<SqliteQueryResult, SqliteRow>>> {
        match tokio::time::timeout_at(self.deadline, self.stream.next()).await {
            Ok(item) => Ok(item.transpose()?),
            Err(_) => Err(RowkitError::Timeout(self.timeout)),
        }
    }

    fn current(&self) -> std::result::Result<&SqliteRow, CursorError> {
        self.row.as_ref().ok_or(CursorError::NoCurrentRow)
    }
}

#[async_trait]
impl RawCursor for SqliteCursor<'_> {
    async fn read(&mut self) -> Result<bool> {
        self.row = None;
        match std::mem::replace(&mut self.position, Position::InRows) {
            Position::Pending(row) => {
                self.row = Some(row);
                Ok(true)
            }
            Position::InRows => match self.pull().await? {
                Some(Either::Right(row)) => {
                    self.row = Some(row);
                    Ok(true)
                }
                Some(Either::Left(_)) => {
                    self.position = Position::EndOfSet;
                    Ok(false)
                }
                None => {
                    self.position = Position::Exhausted;
                    Ok(false)
                }
            },
            finished => {
                self.position = finished;
                Ok(false)
            }
        }
    }

    async fn next_result(&mut self) -> Result<bool> {
        self.row = None;

        // Discard whatever is left of the current result set.
        loop {
            match std::mem::replace(&mut self.position, Position::InRows) {
                Position::InRows | Position::Pending(_) => match self.pull().await? {
                    Some(Either::Right(_)) => {}
                    Some(Either::Left(_)) => {
                        self.position = Position::EndOfSet;
                        break;
                    }
                    None => {
                        self.position = Position::Exhausted;
                        return Ok(false);
                    }
                },
                Position::EndOfSet => break,
                Position::Exhausted => {
                    self.position = Position::Exhausted;
                    return Ok(false);
                }
            }
        }

        match self.pull().await? {
            Some(Either::Right(row)) => {
                self.position = Position::Pending(row);
                Ok(true)
            }
            // A statement that produced no rows still counts as a result set.
            Some(Either::Left(_)) => {
                self.position = Position::EndOfSet;
                Ok(true)
            }
            None => {
                self.position = Position::Exhausted;
                Ok(false)
            }
        }
    }

    fn ordinal(&self, name: &str) -> std::result::Result<usize, BoxDynError> {
        let row = self.current()?;
        Ok(row.try_column(name)?.ordinal())
    }

    fn value(&self, ordinal: usize) -> std::result::Result<Value, BoxDynError> {
        decode_value(self.current()?, ordinal)
    }
}

/// Decodes a column by its storage class, refined by a declared BOOLEAN type.
fn decode_value(row: &SqliteRow, ordinal: usize) -> std::result::Result<Value, BoxDynError> {
    let raw = row.try_get_raw(ordinal)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let storage = raw.type_info().name().to_string();
    let declared_bool = row
        .columns()
        .get(ordinal)
        .is_some_and(|c| c.type_info().name().eq_ignore_ascii_case("BOOLEAN"));

    let value = match storage.as_str() {
        "INTEGER" => {
            let i: i64 = row.try_get_unchecked(ordinal)?;
            if declared_bool {
                Value::Bool(i != 0)
            } else {
                Value::Int(i)
            }
        }
        "REAL" => Value::Float(row.try_get_unchecked(ordinal)?),
        "BLOB" => Value::Bytes(row.try_get_unchecked(ordinal)?),
        _ => Value::String(row.try_get_unchecked(ordinal)?),
    };
    Ok(value)
}
