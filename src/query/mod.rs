//! Typed reads over raw cursors.
//!
//! [`TypedCursor`] converts column values; [`fetch`] and [`fetch_one`] run one
//! query; the `fetch_many*` family runs several queries in one round trip.

mod batch;
mod cursor;
mod fetch;

pub use batch::{
    combine_statements, fetch_many2, fetch_many3, fetch_many4, merge_parameters, ResultSetSpec,
    STATEMENT_SEPARATOR,
};
pub use cursor::{FromValue, TypedCursor};
pub use fetch::{fetch, fetch_one, QueryOptions, DEFAULT_TIMEOUT_SECS};
