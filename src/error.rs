//! Categorized export failures.
//!
//! Most code paths return `anyhow::Result` with context attached; the variants
//! here cover the failures callers may want to match on.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ExportError {
    /// A requested primary table is neither a table nor a view
    #[error("no such table or view: {0}")]
    NoSuchTable(String),

    /// Primary tables only make sense against a single database
    #[error("more than one database included while primary tables specified")]
    MultipleDatabasesWithPrimary,

    /// Caller-supplied header labels do not line up with the result columns
    #[error("header has {labels} labels but the query returned {columns} columns")]
    HeaderMismatch { labels: usize, columns: usize },

    /// A traversal produced nothing to select
    #[error("no exportable columns for {0}")]
    NoColumns(String),

    #[error("unknown engine: {0}. Valid: auto, sqlite, duckdb")]
    UnknownEngine(String),
}
