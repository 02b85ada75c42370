//! Single-result fetch operations.

use crate::db::{Connection, ConnectionSource, Parameter};
use crate::error::Result;
use crate::query::TypedCursor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default statement timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Per-call execution options. Also the `[query]` section of the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Upper bound on the time spent executing and reading one statement.
    #[serde(with = "duration_secs", rename = "timeout_secs")]
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl QueryOptions {
    /// Overrides the statement timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fetches every row of `query`, mapped through `mapper`, in row order.
///
/// A connection obtained from a descriptor or pool is scoped to this call and
/// released on every exit path. Zero rows yield an empty `Vec`. The first mapping
/// failure aborts the call; no partial results are returned.
pub async fn fetch<S, T, F>(
    source: S,
    query: &str,
    mapper: F,
    params: &[Parameter],
    options: &QueryOptions,
) -> Result<Vec<T>>
where
    S: ConnectionSource,
    S::Connection: Connection,
    F: Fn(&TypedCursor<'_>) -> Result<T>,
{
    let mut conn = source.acquire().await?;
    let sql = conn.native_sql(query, params);
    let mut raw = conn.execute(&sql, params, options.timeout).await?;
    let mut cursor = TypedCursor::new(raw.as_mut());

    let mut rows = Vec::new();
    while cursor.read().await? {
        rows.push(mapper(&cursor)?);
    }
    Ok(rows)
}

/// Fetches the first row of `query`, or `None` when there are no rows.
///
/// Rows after the first are never read or mapped; they are discarded when the
/// cursor is dropped.
pub async fn fetch_one<S, T, F>(
    source: S,
    query: &str,
    mapper: F,
    params: &[Parameter],
    options: &QueryOptions,
) -> Result<Option<T>>
where
    S: ConnectionSource,
    S::Connection: Connection,
    F: Fn(&TypedCursor<'_>) -> Result<T>,
{
    let mut conn = source.acquire().await?;
    let sql = conn.native_sql(query, params);
    let mut raw = conn.execute(&sql, params, options.timeout).await?;
    let mut cursor = TypedCursor::new(raw.as_mut());

    if cursor.read().await? {
        mapper(&cursor).map(Some)
    } else {
        Ok(None)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
