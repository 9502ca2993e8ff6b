//! Schema model and foreign-key join resolution.
//!
//! This module provides:
//! - Data models for schema objects, columns and foreign keys
//! - The `SchemaInspector` capability implemented by each database backend
//! - Foreign-key traversal from a primary table to all of its ancestors
//! - Query building for the joined export of a primary table

mod query;
mod traversal;

pub use query::*;
pub use traversal::*;

use anyhow::Result;
use std::fmt;

/// Kind of a schema object that can be exported to a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    View,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Table => write!(f, "table"),
            ObjectKind::View => write!(f, "view"),
        }
    }
}

/// A table or view as listed by the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaObject {
    pub name: String,
    pub kind: ObjectKind,
}

/// Column definition within a table, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared type as written in the DDL (may be empty)
    pub declared_type: String,
    /// Whether the column is declared NOT NULL
    pub not_null: bool,
    /// 1-based position within the primary key, 0 when not part of it
    pub pk_position: u32,
}

impl Column {
    pub fn is_primary_key(&self) -> bool {
        self.pk_position > 0
    }
}

/// Foreign key constraint, possibly composite or self-referencing.
///
/// `child_columns[i]` references `parent_columns[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub child_table: String,
    pub child_columns: Vec<String>,
    pub parent_table: String,
    pub parent_columns: Vec<String>,
}

impl ForeignKey {
    /// Iterate `(child column, parent column)` pairs in key order
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.child_columns
            .iter()
            .zip(self.parent_columns.iter())
            .map(|(c, p)| (c.as_str(), p.as_str()))
    }
}

/// Read-only access to the live schema of a database.
///
/// Every call queries the database; nothing is cached between calls.
pub trait SchemaInspector {
    /// All tables and views in schema-listing order
    fn objects(&self) -> Result<Vec<SchemaObject>>;

    /// Kind of the named object, or `None` if it is neither a table nor a view
    fn object_kind(&self, name: &str) -> Result<Option<ObjectKind>>;

    /// Outgoing foreign keys of a table, in the order the database reports them
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>>;

    /// Columns of a table or view in declaration order
    fn columns(&self, table: &str) -> Result<Vec<Column>>;
}

/// Primary key column names ordered by key position
pub fn primary_key_columns(columns: &[Column]) -> Vec<String> {
    let mut pk: Vec<&Column> = columns.iter().filter(|c| c.is_primary_key()).collect();
    pk.sort_by_key(|c| c.pk_position);
    pk.into_iter().map(|c| c.name.clone()).collect()
}

/// SQL identifiers compare case-insensitively
pub fn same_name(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Quote an identifier for use in generated SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// How values of a result column are represented, decided once per query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Text,
    Boolean,
    Bytes,
    Timestamp,
    Date,
    Time,
    /// No usable declared type; each value keeps its stored representation
    Dynamic,
}

impl ColumnKind {
    /// Classify a declared or described SQL type.
    ///
    /// Known type names are matched first, then SQLite's affinity rules apply
    /// to anything else.
    pub fn from_declared_type(type_str: &str) -> Self {
        let type_lower = type_str.trim().to_lowercase();
        if type_lower.is_empty() {
            return ColumnKind::Dynamic;
        }
        let base_type = type_lower.split('(').next().unwrap_or(&type_lower).trim();

        match base_type {
            "bool" | "boolean" | "logical" => return ColumnKind::Boolean,
            "date" => return ColumnKind::Date,
            "datetime" | "timestamp" | "timestamptz" | "timestamp with time zone"
            | "timestamp_s" | "timestamp_ms" | "timestamp_ns" => return ColumnKind::Timestamp,
            "time" | "timetz" | "time with time zone" => return ColumnKind::Time,
            "interval" | "uuid" | "json" => return ColumnKind::Text,
            "decimal" | "numeric" => return ColumnKind::Float,
            _ => {}
        }

        // Composite DuckDB types (lists, structs, maps) keep their own rendering
        if type_lower.ends_with("[]") || base_type.starts_with("struct") || base_type.starts_with("map") {
            return ColumnKind::Dynamic;
        }

        if type_lower.contains("int") {
            ColumnKind::Integer
        } else if type_lower.contains("char") || type_lower.contains("clob") || type_lower.contains("text") {
            ColumnKind::Text
        } else if type_lower.contains("blob") || type_lower.contains("binary") || type_lower == "bytea" {
            ColumnKind::Bytes
        } else if type_lower.contains("real") || type_lower.contains("floa") || type_lower.contains("doub") {
            ColumnKind::Float
        } else {
            ColumnKind::Dynamic
        }
    }
}
