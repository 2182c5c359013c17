//! Database module for PostgreSQL query execution
//!
//! The query agent talks to the database only through [`QueryExecutor`].

pub mod executor;

pub use executor::{PgExecutor, QueryExecutor};

/// One result row, columns in select order.
pub type Row = serde_json::Map<String, serde_json::Value>;
