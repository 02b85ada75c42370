//! Virtual cursor over an in-memory row sequence.

use crate::db::Value;
use crate::error::{Result, RowkitError};

type Extractor<R> = Box<dyn Fn(&R) -> Value + Send + Sync>;

/// A named column whose value is computed from a row object.
pub struct ColumnSpec<R> {
    name: String,
    extractor: Extractor<R>,
}

impl<R> ColumnSpec<R> {
    /// Creates a column named `name` whose values come from `extract`.
    pub fn new<V, F>(name: impl Into<String>, extract: F) -> Self
    where
        V: Into<Value>,
        F: Fn(&R) -> V + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            extractor: Box::new(move |row| extract(row).into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Computes this column's value for `row`.
    pub fn extract(&self, row: &R) -> Value {
        (self.extractor)(row)
    }
}

impl<R> std::fmt::Debug for ColumnSpec<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnSpec")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The pull interface a bulk-load sink reads rows from.
///
/// Forward-only: `read` moves to the next row, and values are available only
/// while positioned on a row.
pub trait VirtualCursor: Send {
    fn field_count(&self) -> usize;

    /// Resolves a column name to its ordinal, case-sensitively.
    fn ordinal(&self, name: &str) -> Result<usize>;

    /// Advances to the next row. Returns `false` when no rows remain.
    fn read(&mut self) -> bool;

    fn value(&self, ordinal: usize) -> Result<Value>;

    /// Releases the cursor. Reads after closing report exhaustion.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    Exhausted,
}

/// Presents a slice of rows as a [`VirtualCursor`], one column per [`ColumnSpec`].
///
/// Values are computed lazily when the sink asks for them; nothing is
/// materialized up front.
pub struct StreamingRowSource<'r, R> {
    rows: &'r [R],
    columns: &'r [ColumnSpec<R>],
    position: Position,
}

impl<'r, R> StreamingRowSource<'r, R> {
    pub fn new(rows: &'r [R], columns: &'r [ColumnSpec<R>]) -> Self {
        Self {
            rows,
            columns,
            position: Position::BeforeFirst,
        }
    }

    fn current(&self) -> Result<&'r R> {
        match self.position {
            Position::At(index) => Ok(&self.rows[index]),
            Position::BeforeFirst => Err(RowkitError::internal(
                "value requested before the first read",
            )),
            Position::Exhausted => Err(RowkitError::internal(
                "value requested after the last row",
            )),
        }
    }
}

impl<R: Sync> VirtualCursor for StreamingRowSource<'_, R> {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn ordinal(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| {
                RowkitError::unknown_column(name, format!("no column spec named '{name}'"))
            })
    }

    fn read(&mut self) -> bool {
        let next = match self.position {
            Position::BeforeFirst => 0,
            Position::At(index) => index + 1,
            Position::Exhausted => return false,
        };
        if next < self.rows.len() {
            self.position = Position::At(next);
            true
        } else {
            self.position = Position::Exhausted;
            false
        }
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        let row = self.current()?;
        let column = self.columns.get(ordinal).ok_or_else(|| {
            RowkitError::internal(format!(
                "ordinal {ordinal} out of range for {} columns",
                self.columns.len()
            ))
        })?;
        Ok(column.extract(row))
    }

    fn close(&mut self) {
        self.position = Position::Exhausted;
    }
}
