//! Integration tests for rowkit.

pub mod bulk_test;
pub mod common;
pub mod connection_test;
pub mod fetch_test;
