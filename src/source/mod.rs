//! Database backends.
//!
//! A backend is an open, read-only connection that can describe its schema
//! (`SchemaInspector`) and stream the rows of a query into a `RowVisitor`
//! one at a time.
//!
//! # Example
//!
//! ```ignore
//! use db2xlsx::source::{open, Engine};
//! use std::path::Path;
//!
//! let db = open(Path::new("shop.db"), Engine::Auto)?;
//! for object in db.objects()? {
//!     println!("{} ({})", object.name, object.kind);
//! }
//! ```

mod duck;
mod sqlite;
mod value;

pub use duck::DuckDbSource;
pub use sqlite::SqliteSource;
pub use value::CellValue;

use crate::error::ExportError;
use crate::schema::{ColumnKind, SchemaInspector};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";
const DUCKDB_MAGIC: &[u8] = b"DUCK";

/// Database engine behind an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Detect from the file header, then the extension
    #[default]
    Auto,
    Sqlite,
    DuckDb,
}

impl std::str::FromStr for Engine {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Engine::Auto),
            "sqlite" | "sqlite3" => Ok(Engine::Sqlite),
            "duckdb" | "duck" => Ok(Engine::DuckDb),
            _ => Err(ExportError::UnknownEngine(s.to_string())),
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Engine::Auto => write!(f, "auto"),
            Engine::Sqlite => write!(f, "sqlite"),
            Engine::DuckDb => write!(f, "duckdb"),
        }
    }
}

impl Engine {
    /// Resolve `Auto` for a concrete file.
    ///
    /// SQLite files start with a fixed magic string and DuckDB files carry
    /// `DUCK` at offset 8. Files too short to tell fall back to the extension,
    /// and anything unrecognized is treated as SQLite.
    pub fn resolve(self, path: &Path) -> Result<Engine> {
        if self != Engine::Auto {
            return Ok(self);
        }

        let mut header = [0u8; 16];
        let mut file = std::fs::File::open(path)
            .with_context(|| format!("Cannot open {}", path.display()))?;
        let read = file.read(&mut header)?;
        let header = &header[..read];

        if header.starts_with(SQLITE_MAGIC) {
            return Ok(Engine::Sqlite);
        }
        if header.len() >= 12 && &header[8..12] == DUCKDB_MAGIC {
            return Ok(Engine::DuckDb);
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Ok(match ext.as_str() {
            "duckdb" | "ddb" => Engine::DuckDb,
            _ => Engine::Sqlite,
        })
    }
}

/// Name and representation of one result column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub kind: ColumnKind,
}

/// Receives a query result: the columns once, then each row in order.
///
/// `columns` is always called, even when the result has no rows.
pub trait RowVisitor {
    fn columns(&mut self, columns: &[ResultColumn]) -> Result<()>;

    fn row(&mut self, values: &[CellValue]) -> Result<()>;
}

/// An open database that can be inspected and queried
pub trait DataSource: SchemaInspector {
    fn engine(&self) -> Engine;

    /// Run `sql` and feed its result to `visitor`, returning the row count.
    ///
    /// Rows are read one at a time; the first error from the database or the
    /// visitor stops the stream.
    fn stream(&self, sql: &str, visitor: &mut dyn RowVisitor) -> Result<u64>;
}

/// Open `path` read-only with the given (or detected) engine
pub fn open(path: &Path, engine: Engine) -> Result<Box<dyn DataSource>> {
    match engine.resolve(path)? {
        Engine::DuckDb => Ok(Box::new(DuckDbSource::open(path)?)),
        _ => Ok(Box::new(SqliteSource::open(path)?)),
    }
}
