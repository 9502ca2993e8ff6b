//! SQLite backend.

use super::{CellValue, DataSource, Engine, ResultColumn, RowVisitor};
use crate::schema::{
    primary_key_columns, Column, ColumnKind, ForeignKey, ObjectKind, SchemaInspector, SchemaObject,
};
use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;

/// Read-only SQLite connection
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection (used for in-memory databases)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    fn object_kind_from(kind: &str) -> ObjectKind {
        if kind.eq_ignore_ascii_case("view") {
            ObjectKind::View
        } else {
            ObjectKind::Table
        }
    }
}

impl SchemaInspector for SqliteSource {
    fn objects(&self) -> Result<Vec<SchemaObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY rowid",
        )?;
        let objects = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let kind: String = row.get(1)?;
                Ok(SchemaObject {
                    name,
                    kind: Self::object_kind_from(&kind),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(objects)
    }

    fn object_kind(&self, name: &str) -> Result<Option<ObjectKind>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM sqlite_master \
                 WHERE name = ?1 COLLATE NOCASE AND type IN ('table', 'view')",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind.map(|k| Self::object_kind_from(&k)))
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let rows = stmt
            .query_map(params![table], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // One row per column pair; consecutive rows with the same id form one key
        let mut grouped: Vec<(i64, ForeignKey, bool)> = Vec::new();
        for (id, parent, from, to) in rows {
            if grouped.last().map(|(last_id, _, _)| *last_id) != Some(id) {
                grouped.push((
                    id,
                    ForeignKey {
                        child_table: table.to_string(),
                        child_columns: Vec::new(),
                        parent_table: parent,
                        parent_columns: Vec::new(),
                    },
                    false,
                ));
            }
            if let Some((_, fk, implicit)) = grouped.last_mut() {
                fk.child_columns.push(from);
                match to {
                    Some(to) => fk.parent_columns.push(to),
                    None => *implicit = true,
                }
            }
        }

        let mut foreign_keys = Vec::with_capacity(grouped.len());
        for (_, mut fk, implicit) in grouped {
            if implicit {
                // `REFERENCES parent` without columns targets the parent's primary key
                let parent_columns = self.columns(&fk.parent_table)?;
                fk.parent_columns = primary_key_columns(&parent_columns);
                if fk.parent_columns.len() != fk.child_columns.len() {
                    anyhow::bail!(
                        "foreign key {}({}) references {} without columns, and its primary key does not match",
                        table,
                        fk.child_columns.join(", "),
                        fk.parent_table
                    );
                }
            }
            foreign_keys.push(fk);
        }
        Ok(foreign_keys)
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns = stmt
            .query_map(params![table], |row| {
                Ok(Column {
                    name: row.get(0)?,
                    declared_type: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(2)? != 0,
                    pk_position: row.get::<_, i64>(3)?.max(0) as u32,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }
}

impl DataSource for SqliteSource {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    fn stream(&self, sql: &str, visitor: &mut dyn RowVisitor) -> Result<u64> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;

        let columns: Vec<ResultColumn> = stmt
            .columns()
            .iter()
            .map(|c| ResultColumn {
                name: c.name().to_string(),
                kind: ColumnKind::from_declared_type(c.decl_type().unwrap_or_default()),
            })
            .collect();
        visitor.columns(&columns)?;

        let mut rows = stmt
            .query([])
            .with_context(|| format!("Failed to execute query: {}", sql))?;

        let mut values = Vec::with_capacity(columns.len());
        let mut count = 0u64;
        while let Some(row) = rows.next()? {
            values.clear();
            for (i, column) in columns.iter().enumerate() {
                values.push(cell_value(row.get_ref(i)?, column.kind));
            }
            visitor.row(&values)?;
            count += 1;
        }
        Ok(count)
    }
}

/// Convert one stored value, letting the column kind refine it
fn cell_value(value: ValueRef<'_>, kind: ColumnKind) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Integer(n) => CellValue::from_integer(kind, n),
        ValueRef::Real(f) => CellValue::Float(f),
        ValueRef::Text(s) => CellValue::from_text(kind, &String::from_utf8_lossy(s)),
        ValueRef::Blob(b) => match (kind, std::str::from_utf8(b)) {
            (ColumnKind::Text, Ok(s)) => CellValue::Text(s.to_string()),
            _ => CellValue::Bytes(b.to_vec()),
        },
    }
}
