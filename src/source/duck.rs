//! DuckDB backend.

use super::{CellValue, DataSource, Engine, ResultColumn, RowVisitor};
use crate::schema::{Column, ColumnKind, ForeignKey, ObjectKind, SchemaInspector, SchemaObject};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use duckdb::types::{TimeUnit, Value, ValueRef};
use duckdb::{params, AccessMode, Config, Connection};
use std::path::Path;

/// Read-only DuckDB connection
pub struct DuckDbSource {
    conn: Connection,
}

impl DuckDbSource {
    pub fn open(path: &Path) -> Result<Self> {
        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .context("Failed to configure DuckDB")?;
        let conn = Connection::open_with_flags(path, config)
            .with_context(|| format!("Failed to open DuckDB database {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection (used for in-memory databases)
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Column names and types of a query's result, without running it
    fn describe(&self, sql: &str) -> Result<Vec<ResultColumn>> {
        let describe = format!("DESCRIBE {}", sql);
        let mut stmt = self
            .conn
            .prepare(&describe)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        let columns = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let column_type: String = row.get(1)?;
                Ok(ResultColumn {
                    name,
                    kind: ColumnKind::from_declared_type(&column_type),
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(columns)
    }
}

fn string_list(value: Value) -> Vec<String> {
    match value {
        Value::List(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Text(s) => s,
                other => format!("{:?}", other),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl SchemaInspector for DuckDbSource {
    fn objects(&self) -> Result<Vec<SchemaObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, kind FROM ( \
               SELECT table_name AS name, 'table' AS kind, table_oid AS oid FROM duckdb_tables() \
               WHERE schema_name = 'main' AND database_name = current_database() AND NOT internal \
               UNION ALL \
               SELECT view_name, 'view', view_oid FROM duckdb_views() \
               WHERE schema_name = 'main' AND database_name = current_database() AND NOT internal \
             ) ORDER BY oid",
        )?;
        let objects = stmt
            .query_map([], |row| {
                let name: String = row.get(0)?;
                let kind: String = row.get(1)?;
                Ok(SchemaObject {
                    name,
                    kind: if kind == "view" {
                        ObjectKind::View
                    } else {
                        ObjectKind::Table
                    },
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(objects)
    }

    fn object_kind(&self, name: &str) -> Result<Option<ObjectKind>> {
        Ok(self
            .objects()?
            .into_iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
            .map(|o| o.kind))
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT referenced_table, constraint_column_names, referenced_column_names \
             FROM duckdb_constraints() \
             WHERE constraint_type = 'FOREIGN KEY' AND schema_name = 'main' \
               AND database_name = current_database() AND table_name = ? \
             ORDER BY constraint_index",
        )?;
        let foreign_keys = stmt
            .query_map(params![table], |row| {
                Ok(ForeignKey {
                    child_table: table.to_string(),
                    parent_table: row.get(0)?,
                    child_columns: string_list(row.get(1)?),
                    parent_columns: string_list(row.get(2)?),
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(foreign_keys)
    }

    fn columns(&self, table: &str) -> Result<Vec<Column>> {
        let sql = format!(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info({}) ORDER BY cid",
            quote_literal(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, bool>(3)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        // DuckDB only flags key membership, so positions follow declaration order
        let mut pk_seen = 0;
        Ok(rows
            .into_iter()
            .map(|(name, declared_type, not_null, pk)| {
                let pk_position = if pk {
                    pk_seen += 1;
                    pk_seen
                } else {
                    0
                };
                Column {
                    name,
                    declared_type,
                    not_null,
                    pk_position,
                }
            })
            .collect())
    }
}

impl DataSource for DuckDbSource {
    fn engine(&self) -> Engine {
        Engine::DuckDb
    }

    fn stream(&self, sql: &str, visitor: &mut dyn RowVisitor) -> Result<u64> {
        let columns = self.describe(sql)?;
        visitor.columns(&columns)?;

        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
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

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// DuckDB stores `infinity` as the type's maximum and `-infinity` as its negation
fn infinity_label(value: i64, max: i64) -> Option<&'static str> {
    if value == max {
        Some("infinity")
    } else if value == -max {
        Some("-infinity")
    } else {
        None
    }
}

fn timestamp_from(unit: TimeUnit, ts: i64) -> Option<NaiveDateTime> {
    let micros = to_micros(unit, ts);
    let secs = micros.div_euclid(1_000_000);
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    chrono::DateTime::from_timestamp(secs, nanos).map(|dt| dt.naive_utc())
}

fn date_from(days: i32) -> Option<NaiveDate> {
    // 719163 = days from 0001-01-01 to 1970-01-01
    719_163i32
        .checked_add(days)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

fn time_from(unit: TimeUnit, t: i64) -> Option<NaiveTime> {
    let micros = to_micros(unit, t);
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

fn timestamp_text(unit: TimeUnit, ts: i64) -> String {
    match infinity_label(ts, i64::MAX) {
        Some(label) => label.to_string(),
        None => timestamp_from(unit, ts)
            .map(|dt| dt.to_string())
            .unwrap_or_else(|| ts.to_string()),
    }
}

fn date_text(days: i32) -> String {
    match infinity_label(i64::from(days), i64::from(i32::MAX)) {
        Some(label) => label.to_string(),
        None => date_from(days)
            .map(|d| d.to_string())
            .unwrap_or_else(|| days.to_string()),
    }
}

/// Interval in DuckDB's own notation, e.g. `1 year 2 months 3 days 04:05:06`
fn interval_text(months: i32, days: i32, nanos: i64) -> String {
    let mut parts = Vec::new();
    for (n, unit) in [(months / 12, "year"), (months % 12, "month"), (days, "day")] {
        if n != 0 {
            let plural = if n.unsigned_abs() == 1 { "" } else { "s" };
            parts.push(format!("{} {}{}", n, unit, plural));
        }
    }

    if nanos != 0 || parts.is_empty() {
        let sign = if nanos < 0 { "-" } else { "" };
        let micros = (nanos / 1_000).unsigned_abs();
        let secs = micros / 1_000_000;
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3_600,
            secs / 60 % 60,
            secs % 60
        );
        if micros % 1_000_000 != 0 {
            time.push_str(&format!(".{:06}", micros % 1_000_000));
        }
        parts.push(time);
    }
    parts.join(" ")
}

fn joined(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(", ")
}

/// Text form of a value that has no cell type of its own (lists, structs, maps)
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::TinyInt(n) => n.to_string(),
        Value::SmallInt(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::HugeInt(n) => n.to_string(),
        Value::UHugeInt(n) => n.to_string(),
        Value::UTinyInt(n) => n.to_string(),
        Value::USmallInt(n) => n.to_string(),
        Value::UInt(n) => n.to_string(),
        Value::UBigInt(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Double(f) => f.to_string(),
        Value::Decimal(d) => d.to_string(),
        Value::Timestamp(unit, ts) => timestamp_text(*unit, *ts),
        Value::Text(s) | Value::Enum(s) => s.clone(),
        Value::Blob(b) | Value::Geometry(b) => BASE64.encode(b),
        Value::Date32(days) => date_text(*days),
        Value::Time64(unit, t) => time_from(*unit, *t)
            .map(|t| t.to_string())
            .unwrap_or_else(|| t.to_string()),
        Value::Interval {
            months,
            days,
            nanos,
        } => interval_text(*months, *days, *nanos),
        Value::List(items) | Value::Array(items) => {
            format!("[{}]", joined(items.iter().map(render_value)))
        }
        Value::Struct(fields) => format!(
            "{{{}}}",
            joined(
                fields
                    .iter()
                    .map(|(k, v)| format!("'{}': {}", k, render_value(v)))
            )
        ),
        Value::Map(entries) => format!(
            "{{{}}}",
            joined(
                entries
                    .iter()
                    .map(|(k, v)| format!("{}={}", render_value(k), render_value(v)))
            )
        ),
        Value::Union(inner) => render_value(inner),
        other => format!("{:?}", other),
    }
}

/// Convert one DuckDB value into its cell representation.
///
/// Values a cell cannot hold natively (infinite dates, intervals, nested
/// types) are written as text.
fn cell_value(value: ValueRef<'_>, kind: ColumnKind) -> CellValue {
    match value {
        ValueRef::Null => CellValue::Null,
        ValueRef::Boolean(b) => CellValue::Boolean(b),
        ValueRef::TinyInt(n) => CellValue::from_integer(kind, i64::from(n)),
        ValueRef::SmallInt(n) => CellValue::from_integer(kind, i64::from(n)),
        ValueRef::Int(n) => CellValue::from_integer(kind, i64::from(n)),
        ValueRef::BigInt(n) => CellValue::from_integer(kind, n),
        ValueRef::UTinyInt(n) => CellValue::Integer(i64::from(n)),
        ValueRef::USmallInt(n) => CellValue::Integer(i64::from(n)),
        ValueRef::UInt(n) => CellValue::Integer(i64::from(n)),
        ValueRef::UBigInt(n) => i64::try_from(n)
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::Text(n.to_string())),
        ValueRef::HugeInt(n) => i64::try_from(n)
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::Text(n.to_string())),
        ValueRef::UHugeInt(n) => i64::try_from(n)
            .map(CellValue::Integer)
            .unwrap_or_else(|_| CellValue::Text(n.to_string())),
        ValueRef::Float(f) => CellValue::Float(f64::from(f)),
        ValueRef::Double(f) => CellValue::Float(f),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .map(CellValue::Float)
                .unwrap_or(CellValue::Text(text))
        }
        ValueRef::Text(s) => CellValue::from_text(kind, &String::from_utf8_lossy(s)),
        ValueRef::Blob(b) | ValueRef::Geometry(b) => CellValue::Bytes(b.to_vec()),
        ValueRef::Timestamp(unit, ts) => {
            let infinite = infinity_label(ts, i64::MAX).is_some();
            match timestamp_from(unit, ts) {
                Some(dt) if !infinite => CellValue::Timestamp(dt),
                _ => CellValue::Text(timestamp_text(unit, ts)),
            }
        }
        ValueRef::Date32(days) => {
            let infinite = infinity_label(i64::from(days), i64::from(i32::MAX)).is_some();
            match date_from(days) {
                Some(date) if !infinite => CellValue::Date(date),
                _ => CellValue::Text(date_text(days)),
            }
        }
        ValueRef::Time64(unit, t) => match time_from(unit, t) {
            Some(time) => CellValue::Time(time),
            None => CellValue::Text(t.to_string()),
        },
        ValueRef::Interval {
            months,
            days,
            nanos,
        } => CellValue::Text(interval_text(months, days, nanos)),
        ValueRef::Enum(..) => match value.as_str() {
            Ok(label) => CellValue::Text(label.to_string()),
            Err(_) => CellValue::Text(render_value(&Value::from(value))),
        },
        other => CellValue::Text(render_value(&Value::from(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_micros() {
        assert_eq!(to_micros(TimeUnit::Second, 2), 2_000_000);
        assert_eq!(to_micros(TimeUnit::Millisecond, 2), 2_000);
        assert_eq!(to_micros(TimeUnit::Microsecond, 2), 2);
        assert_eq!(to_micros(TimeUnit::Nanosecond, 2_000), 2);
    }

    #[test]
    fn test_cell_value_conversions() {
        assert_eq!(
            cell_value(ValueRef::Int(7), ColumnKind::Integer),
            CellValue::Integer(7)
        );
        assert_eq!(
            cell_value(ValueRef::UBigInt(u64::MAX), ColumnKind::Integer),
            CellValue::Text(u64::MAX.to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Date32(0), ColumnKind::Date),
            CellValue::Date(chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        );
        assert_eq!(
            cell_value(ValueRef::Timestamp(TimeUnit::Microsecond, 1_500_000), ColumnKind::Timestamp),
            CellValue::Timestamp(
                chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
                    .unwrap()
                    .and_hms_micro_opt(0, 0, 1, 500_000)
                    .unwrap()
            )
        );
        assert_eq!(cell_value(ValueRef::Null, ColumnKind::Text), CellValue::Null);
    }

    #[test]
    fn test_infinite_and_out_of_range_dates() {
        assert_eq!(
            cell_value(ValueRef::Date32(i32::MAX), ColumnKind::Date),
            CellValue::Text("infinity".to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Date32(-i32::MAX), ColumnKind::Date),
            CellValue::Text("-infinity".to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Date32(i32::MAX - 1), ColumnKind::Date),
            CellValue::Text((i32::MAX - 1).to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Timestamp(TimeUnit::Microsecond, i64::MAX), ColumnKind::Timestamp),
            CellValue::Text("infinity".to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Timestamp(TimeUnit::Microsecond, -i64::MAX), ColumnKind::Timestamp),
            CellValue::Text("-infinity".to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Timestamp(TimeUnit::Second, i64::MAX / 2), ColumnKind::Timestamp),
            CellValue::Text((i64::MAX / 2).to_string())
        );
    }

    #[test]
    fn test_time_out_of_range() {
        assert_eq!(
            cell_value(ValueRef::Time64(TimeUnit::Microsecond, -1), ColumnKind::Time),
            CellValue::Text("-1".to_string())
        );
        assert_eq!(
            cell_value(ValueRef::Time64(TimeUnit::Second, 3_661), ColumnKind::Time),
            CellValue::Time(NaiveTime::from_hms_opt(1, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_interval_text() {
        assert_eq!(interval_text(1, 2, 3 * 3_600 * 1_000_000_000), "1 month 2 days 03:00:00");
        assert_eq!(interval_text(14, 0, 0), "1 year 2 months");
        assert_eq!(interval_text(0, 1, 0), "1 day");
        assert_eq!(interval_text(0, 0, 0), "00:00:00");
        assert_eq!(interval_text(0, 0, -1_500_000_000), "-00:00:01.500000");
    }

    #[test]
    fn test_render_nested_values() {
        let list = Value::List(vec![Value::Int(1), Value::Null, Value::Text("x".to_string())]);
        assert_eq!(render_value(&list), "[1, NULL, x]");
        assert_eq!(render_value(&Value::Date32(i32::MAX)), "infinity");
        assert_eq!(render_value(&Value::Union(Box::new(Value::Boolean(true)))), "true");
        assert_eq!(
            cell_value(ValueRef::UHugeInt(u128::MAX), ColumnKind::Integer),
            CellValue::Text(u128::MAX.to_string())
        );
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }
}
