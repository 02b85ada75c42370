//! Multi-result batches.
//!
//! Two to four queries are joined into one statement, executed in a single round
//! trip with one merged parameter set, and their result sets are mapped in order.

use crate::db::{Connection, ConnectionSource, Parameter, Value};
use crate::error::{Result, RowkitError};
use crate::query::{QueryOptions, TypedCursor};
use tracing::{debug, trace};

/// Text placed between the queries of a batch.
///
/// The terminator sits on its own line so a query ending in a `--` comment
/// still gets a statement boundary.
pub const STATEMENT_SEPARATOR: &str = "\n;\n";

type RowMapper<T> = Box<dyn Fn(&TypedCursor<'_>) -> Result<T> + Send + Sync>;

/// One query of a batch: its text, its parameters, and its row mapper.
pub struct ResultSetSpec<T> {
    query: String,
    parameters: Vec<Parameter>,
    mapper: RowMapper<T>,
}

impl<T> ResultSetSpec<T> {
    pub fn new<F>(query: impl Into<String>, mapper: F) -> Self
    where
        F: Fn(&TypedCursor<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            query: query.into(),
            parameters: Vec::new(),
            mapper: Box::new(mapper),
        }
    }

    /// Binds a named parameter used by this query.
    pub fn bind(mut self, name: impl AsRef<str>, value: impl Into<Value>) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    /// Appends already-built parameters.
    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Maps every remaining row of the cursor's current result set.
    async fn harvest(&self, cursor: &mut TypedCursor<'_>) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        while cursor.read().await? {
            rows.push((self.mapper)(&*cursor)?);
        }
        Ok(rows)
    }
}

impl<T> std::fmt::Debug for ResultSetSpec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSetSpec")
            .field("query", &self.query)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Unions parameter lists, keeping the first occurrence of each name.
///
/// A name bound more than once must carry equal values every time; otherwise the
/// merge fails with [`RowkitError::ParameterConflict`].
pub fn merge_parameters<'p, I>(lists: I) -> Result<Vec<Parameter>>
where
    I: IntoIterator<Item = &'p [Parameter]>,
{
    let mut merged: Vec<Parameter> = Vec::new();
    for parameter in lists.into_iter().flatten() {
        match merged.iter().find(|p| p.name == parameter.name) {
            Some(existing) if !same_binding(&existing.value, &parameter.value) => {
                return Err(RowkitError::ParameterConflict {
                    name: parameter.name.clone(),
                    first: existing.value.clone(),
                    second: parameter.value.clone(),
                });
            }
            Some(_) => {}
            None => merged.push(parameter.clone()),
        }
    }
    Ok(merged)
}

/// Floats compare by bit pattern, so a NaN bound twice is the same binding.
fn same_binding(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

/// Joins queries into one statement, in order.
pub fn combine_statements<'q, I>(queries: I) -> String
where
    I: IntoIterator<Item = &'q str>,
{
    queries
        .into_iter()
        .map(|q| q.trim().trim_end_matches(';').trim_end())
        .collect::<Vec<_>>()
        .join(STATEMENT_SEPARATOR)
}

/// Builds the combined statement and merged parameters for a batch.
fn prepare(parts: &[(&str, &[Parameter])]) -> Result<(String, Vec<Parameter>)> {
    let parameters = merge_parameters(parts.iter().map(|(_, params)| *params))?;
    let sql = combine_statements(parts.iter().map(|(query, _)| *query));
    debug!(
        "Executing batch of {} queries with {} parameters",
        parts.len(),
        parameters.len()
    );
    Ok((sql, parameters))
}

/// Moves the cursor onto result set `index` (zero-based) of `expected`.
async fn advance(cursor: &mut TypedCursor<'_>, index: usize, expected: usize) -> Result<()> {
    if cursor.next_result().await? {
        trace!("Reading result set {} of {}", index + 1, expected);
        Ok(())
    } else {
        Err(RowkitError::ResultSetCountMismatch {
            expected,
            actual: index,
        })
    }
}

/// Runs two queries in one round trip and maps their result sets in order.
///
/// Parameters are validated before any connection is obtained, so a conflict
/// never reaches the database.
pub async fn fetch_many2<S, A, B>(
    source: S,
    first: &ResultSetSpec<A>,
    second: &ResultSetSpec<B>,
    options: &QueryOptions,
) -> Result<(Vec<A>, Vec<B>)>
where
    S: ConnectionSource,
    S::Connection: Connection,
{
    let (sql, params) = prepare(&[
        (first.query(), first.parameters()),
        (second.query(), second.parameters()),
    ])?;

    let mut conn = source.acquire().await?;
    let sql = conn.native_sql(&sql, &params);
    let mut raw = conn.execute(&sql, &params, options.timeout).await?;
    let mut cursor = TypedCursor::new(raw.as_mut());

    let a = first.harvest(&mut cursor).await?;
    advance(&mut cursor, 1, 2).await?;
    let b = second.harvest(&mut cursor).await?;
    Ok((a, b))
}

/// Runs three queries in one round trip and maps their result sets in order.
pub async fn fetch_many3<S, A, B, C>(
    source: S,
    first: &ResultSetSpec<A>,
    second: &ResultSetSpec<B>,
    third: &ResultSetSpec<C>,
    options: &QueryOptions,
) -> Result<(Vec<A>, Vec<B>, Vec<C>)>
where
    S: ConnectionSource,
    S::Connection: Connection,
{
    let (sql, params) = prepare(&[
        (first.query(), first.parameters()),
        (second.query(), second.parameters()),
        (third.query(), third.parameters()),
    ])?;

    let mut conn = source.acquire().await?;
    let sql = conn.native_sql(&sql, &params);
    let mut raw = conn.execute(&sql, &params, options.timeout).await?;
    let mut cursor = TypedCursor::new(raw.as_mut());

    let a = first.harvest(&mut cursor).await?;
    advance(&mut cursor, 1, 3).await?;
    let b = second.harvest(&mut cursor).await?;
    advance(&mut cursor, 2, 3).await?;
    let c = third.harvest(&mut cursor).await?;
    Ok((a, b, c))
}

/// Runs four queries in one round trip and maps their result sets in order.
pub async fn fetch_many4<S, A, B, C, D>(
    source: S,
    first: &ResultSetSpec<A>,
    second: &ResultSetSpec<B>,
    third: &ResultSetSpec<C>,
    fourth: &ResultSetSpec<D>,
    options: &QueryOptions,
) -> Result<(Vec<A>, Vec<B>, Vec<C>, Vec<D>)>
where
    S: ConnectionSource,
    S::Connection: Connection,
{
    let (sql, params) = prepare(&[
        (first.query(), first.parameters()),
        (second.query(), second.parameters()),
        (third.query(), third.parameters()),
        (fourth.query(), fourth.parameters()),
    ])?;

    let mut conn = source.acquire().await?;
    let sql = conn.native_sql(&sql, &params);
    let mut raw = conn.execute(&sql, &params, options.timeout).await?;
    let mut cursor = TypedCursor::new(raw.as_mut());

    let a = first.harvest(&mut cursor).await?;
    advance(&mut cursor, 1, 4).await?;
    let b = second.harvest(&mut cursor).await?;
    advance(&mut cursor, 2, 4).await?;
    let c = third.harvest(&mut cursor).await?;
    advance(&mut cursor, 3, 4).await?;
    let d = fourth.harvest(&mut cursor).await?;
    Ok((a, b, c, d))
}
