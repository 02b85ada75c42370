//! Bulk insertion from in-memory rows.
//!
//! Rows are exposed to the driver's bulk-load path through a [`VirtualCursor`],
//! so the sink pulls and converts one row at a time.

mod source;

pub use source::{ColumnSpec, StreamingRowSource, VirtualCursor};

use crate::db::{BulkLoad, BulkLoadOptions, BulkLoadRequest, ColumnMapping, ConnectionSource};
use crate::error::Result;
use tracing::debug;

/// Inserts `rows` into `table`, one destination column per [`ColumnSpec`].
///
/// Columns are mapped to destination columns of the same name. The load holds a
/// table lock and has no timeout. Returns the number of rows written.
pub async fn bulk_insert<S, R>(
    source: S,
    table: &str,
    rows: &[R],
    columns: &[ColumnSpec<R>],
) -> Result<u64>
where
    S: ConnectionSource,
    S::Connection: BulkLoad,
    R: Sync,
{
    bulk_insert_with(source, table, rows, columns, BulkLoadOptions::default()).await
}

/// Like [`bulk_insert`], with explicit load options.
pub async fn bulk_insert_with<S, R>(
    source: S,
    table: &str,
    rows: &[R],
    columns: &[ColumnSpec<R>],
    options: BulkLoadOptions,
) -> Result<u64>
where
    S: ConnectionSource,
    S::Connection: BulkLoad,
    R: Sync,
{
    let mappings = columns
        .iter()
        .map(|c| ColumnMapping::identity(c.name()))
        .collect();
    let request = BulkLoadRequest {
        table,
        mappings,
        options,
    };

    debug!(
        "Bulk inserting {} rows into {} ({} columns)",
        rows.len(),
        table,
        columns.len()
    );

    let mut conn = source.acquire().await?;
    let mut cursor = StreamingRowSource::new(rows, columns);
    conn.bulk_load(request, &mut cursor).await
}
