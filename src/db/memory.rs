//! In-memory database driver for testing.
//!
//! Serves scripted result sets instead of executing SQL, and records every
//! statement it is asked to run. Bulk loads land in in-memory tables that can be
//! inspected or served back as result sets.

use super::{
    BulkLoad, BulkLoadRequest, Connection, ConnectionSource, CursorError, Parameter, RawCursor,
    Value,
};
use crate::bulk::VirtualCursor;
use crate::error::{BoxDynError, Result, RowkitError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// A named-column result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Creates a result set with the given columns and rows.
    pub fn new<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Creates a result set with columns but no rows.
    pub fn empty<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(columns, Vec::new())
    }
}

/// A statement recorded by the in-memory driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub timeout: Duration,
}

#[derive(Debug, Default)]
struct MemoryState {
    responses: VecDeque<Vec<ResultSet>>,
    executed: Vec<ExecutedStatement>,
    tables: HashMap<String, ResultSet>,
    rows_read: usize,
    open_connections: usize,
    fail_next_execute: Option<String>,
    fail_next_bulk_load: Option<String>,
}

/// Shared in-memory database handle.
///
/// Cloning is cheap; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    /// Creates an empty in-memory database.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues the result sets returned by the next executed statement.
    pub fn push_response(&self, result_sets: Vec<ResultSet>) {
        self.lock().responses.push_back(result_sets);
    }

    /// Queues the current contents of `table` as the next response.
    pub fn push_table_response(&self, table: &str) {
        let set = self.table(table).unwrap_or_default();
        self.push_response(vec![set]);
    }

    /// Makes the next `execute` call fail with a connection error.
    pub fn fail_next_execute(&self, message: impl Into<String>) {
        self.lock().fail_next_execute = Some(message.into());
    }

    /// Makes the next `bulk_load` call fail with a connection error.
    pub fn fail_next_bulk_load(&self, message: impl Into<String>) {
        self.lock().fail_next_bulk_load = Some(message.into());
    }

    /// Returns every statement executed so far, in order.
    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.lock().executed.clone()
    }

    /// Returns the rows bulk-loaded into `table`, if any.
    pub fn table(&self, table: &str) -> Option<ResultSet> {
        self.lock().tables.get(table).cloned()
    }

    /// Returns how many rows cursors have advanced onto.
    pub fn rows_read(&self) -> usize {
        self.lock().rows_read
    }

    /// Returns how many connections are currently open.
    pub fn open_connections(&self) -> usize {
        self.lock().open_connections
    }

    /// Opens a new connection.
    pub fn connect(&self) -> MemoryConnection {
        self.lock().open_connections += 1;
        MemoryConnection { db: self.clone() }
    }
}

#[async_trait]
impl<'a> ConnectionSource for &'a MemoryDatabase {
    type Connection = MemoryConnection;

    async fn acquire(self) -> Result<Self::Connection> {
        Ok(self.connect())
    }
}

/// A connection to a [`MemoryDatabase`]. Closed when dropped.
#[derive(Debug)]
pub struct MemoryConnection {
    db: MemoryDatabase,
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = self.db.lock();
        state.open_connections = state.open_connections.saturating_sub(1);
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [Parameter],
        timeout: Duration,
    ) -> Result<Box<dyn RawCursor + 'c>> {
        let result_sets = {
            let mut state = self.db.lock();
            if let Some(message) = state.fail_next_execute.take() {
                return Err(RowkitError::connection(message));
            }
            state.executed.push(ExecutedStatement {
                sql: sql.to_string(),
                parameters: params.to_vec(),
                timeout,
            });
            state.responses.pop_front().unwrap_or_default()
        };

        debug!(
            "Memory execute: {} result sets, {} parameters",
            result_sets.len(),
            params.len()
        );

        Ok(Box::new(MemoryCursor::new(self.db.clone(), result_sets)))
    }
}

#[async_trait]
impl BulkLoad for MemoryConnection {
    async fn bulk_load(
        &mut self,
        request: BulkLoadRequest<'_>,
        source: &mut (dyn VirtualCursor + '_),
    ) -> Result<u64> {
        if let Some(message) = self.db.lock().fail_next_bulk_load.take() {
            return Err(RowkitError::connection(message));
        }

        let ordinals = request
            .mappings
            .iter()
            .map(|m| source.ordinal(&m.source))
            .collect::<Result<Vec<_>>>()?;

        let mut rows = Vec::new();
        while source.read() {
            let row = ordinals
                .iter()
                .map(|&ordinal| source.value(ordinal))
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }
        source.close();

        let loaded = rows.len() as u64;
        let mut state = self.db.lock();
        let table = state
            .tables
            .entry(request.table.to_string())
            .or_insert_with(|| {
                ResultSet::empty(request.mappings.iter().map(|m| m.destination.clone()))
            });
        table.rows.extend(rows);

        debug!("Memory bulk load: {} rows into {}", loaded, request.table);
        Ok(loaded)
    }
}

/// Cursor over scripted result sets.
struct MemoryCursor {
    db: MemoryDatabase,
    result_sets: VecDeque<ResultSet>,
    current: Option<ResultSet>,
    next_row: usize,
    row: Option<usize>,
}

impl MemoryCursor {
    fn new(db: MemoryDatabase, result_sets: Vec<ResultSet>) -> Self {
        let mut result_sets: VecDeque<ResultSet> = result_sets.into();
        let current = result_sets.pop_front();
        Self {
            db,
            result_sets,
            current,
            next_row: 0,
            row: None,
        }
    }

    fn current_row(&self) -> std::result::Result<(&ResultSet, &[Value]), BoxDynError> {
        let set = self.current.as_ref().ok_or(CursorError::NoCurrentRow)?;
        let index = self.row.ok_or(CursorError::NoCurrentRow)?;
        Ok((set, &set.rows[index]))
    }
}

#[async_trait]
impl RawCursor for MemoryCursor {
    async fn read(&mut self) -> Result<bool> {
        let Some(set) = self.current.as_ref() else {
            return Ok(false);
        };
        if self.next_row < set.rows.len() {
            self.row = Some(self.next_row);
            self.next_row += 1;
            self.db.lock().rows_read += 1;
            Ok(true)
        } else {
            self.row = None;
            Ok(false)
        }
    }

    async fn next_result(&mut self) -> Result<bool> {
        self.current = self.result_sets.pop_front();
        self.next_row = 0;
        self.row = None;
        Ok(self.current.is_some())
    }

    fn ordinal(&self, name: &str) -> std::result::Result<usize, BoxDynError> {
        let (set, _) = self.current_row()?;
        set.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CursorError::ColumnNotFound(name.to_string()).into())
    }

    fn value(&self, ordinal: usize) -> std::result::Result<Value, BoxDynError> {
        let (_, row) = self.current_row()?;
        row.get(ordinal).cloned().ok_or_else(|| {
            CursorError::OrdinalOutOfRange {
                index: ordinal,
                len: row.len(),
            }
            .into()
        })
    }
}
