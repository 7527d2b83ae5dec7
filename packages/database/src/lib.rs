#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `DuckDB` destination store.
//!
//! Holds the `synthese` destination table, the `parsers` run-bookkeeping
//! table, the `nomenclatures` vocabulary table, and a small `settings`
//! table carrying the deployment-local SRID. The schema is created
//! idempotently on connect.

pub mod db;
pub mod nomenclature_db;
pub mod parser_db;
pub mod synthese_db;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    /// I/O error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be converted to its in-memory type.
    #[error("data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
