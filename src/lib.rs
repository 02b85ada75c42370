//! rowkit - a thin, typed access layer over raw database row cursors.
//!
//! - [`query`]: typed column accessors, single-query fetches, and multi-result
//!   batches executed in one round trip.
//! - [`bulk`]: bulk insertion of in-memory rows through a virtual cursor.
//! - [`db`]: the driver capabilities these build on, with SQLite and in-memory
//!   implementations.

pub mod bulk;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod query;
