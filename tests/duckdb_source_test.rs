//! Integration tests for the DuckDB backend

use calamine::{open_workbook, Data, Reader, Xlsx};
use chrono::NaiveDate;
use db2xlsx::export::{transcribe_planned, ExportOptions, Exporter};
use db2xlsx::progress::ExportProgress;
use db2xlsx::schema::{ExportUnit, ObjectKind, SchemaInspector};
use db2xlsx::sheet::{MemorySheet, SheetCell};
use db2xlsx::source::{open, CellValue, DataSource, DuckDbSource, Engine};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_duckdb(dir: &Path) -> PathBuf {
    let path = dir.join("shop.duckdb");
    let conn = duckdb::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE customer (id INTEGER PRIMARY KEY, name VARCHAR, vip BOOLEAN);
         CREATE TABLE orders (
             id INTEGER PRIMARY KEY,
             customer_id INTEGER REFERENCES customer(id),
             placed TIMESTAMP,
             total DOUBLE
         );
         CREATE VIEW big_orders AS SELECT * FROM orders WHERE total > 10;
         INSERT INTO customer VALUES (1, 'ann', true), (2, 'bob', NULL);
         INSERT INTO orders VALUES (10, 1, TIMESTAMP '2024-05-06 07:08:09', 5.5);
         INSERT INTO orders VALUES (11, 2, NULL, 20.25);",
    )
    .unwrap();
    path
}

#[test]
fn test_engine_detected_from_header() {
    let dir = TempDir::new().unwrap();
    let path = create_duckdb(dir.path());
    // a misleading extension must not matter
    let renamed = dir.path().join("shop.db");
    std::fs::rename(&path, &renamed).unwrap();

    assert_eq!(Engine::Auto.resolve(&renamed).unwrap(), Engine::DuckDb);
    let db = open(&renamed, Engine::Auto).unwrap();
    assert_eq!(db.engine(), Engine::DuckDb);
}

#[test]
fn test_schema_inspection() {
    let dir = TempDir::new().unwrap();
    let db = DuckDbSource::open(&create_duckdb(dir.path())).unwrap();

    let objects: Vec<_> = db
        .objects()
        .unwrap()
        .into_iter()
        .map(|o| (o.name, o.kind))
        .collect();
    assert_eq!(
        objects,
        vec![
            ("customer".to_string(), ObjectKind::Table),
            ("orders".to_string(), ObjectKind::Table),
            ("big_orders".to_string(), ObjectKind::View),
        ]
    );

    let fks = db.foreign_keys("orders").unwrap();
    assert_eq!(fks.len(), 1);
    assert_eq!(fks[0].parent_table, "customer");
    assert_eq!(fks[0].child_columns, vec!["customer_id"]);
    assert_eq!(fks[0].parent_columns, vec!["id"]);

    let columns = db.columns("customer").unwrap();
    assert_eq!(columns[0].name, "id");
    assert!(columns[0].is_primary_key());
    assert_eq!(columns[2].declared_type, "BOOLEAN");

    assert_eq!(db.object_kind("ORDERS").unwrap(), Some(ObjectKind::Table));
    assert_eq!(db.object_kind("nope").unwrap(), None);
}

#[test]
fn test_joined_unit() {
    let dir = TempDir::new().unwrap();
    let db = DuckDbSource::open(&create_duckdb(dir.path())).unwrap();

    let unit = ExportUnit::resolve(&db, "orders").unwrap();
    assert_eq!(unit.sheet_name("&"), "orders&customer");
    assert_eq!(
        unit.labels(),
        vec![
            "orders.id",
            "orders.placed",
            "orders.total",
            "customer.id",
            "customer.name",
            "customer.vip"
        ]
    );
}

#[test]
fn test_typed_values() {
    let dir = TempDir::new().unwrap();
    let db = DuckDbSource::open(&create_duckdb(dir.path())).unwrap();
    let options = ExportOptions {
        primary: vec!["orders".to_string()],
        ..Default::default()
    };
    let plan = Exporter::new(&db, &options).plan().unwrap();

    let mut sheet = MemorySheet::new();
    let rows = transcribe_planned(&db, &plan[0], &mut sheet, &ExportProgress::hidden()).unwrap();
    assert_eq!(rows, 2);

    // find the row of order 10 regardless of join order
    let row = (1..=2)
        .find(|r| sheet.cell(*r, 0) == Some(&SheetCell::Value(CellValue::Integer(10))))
        .unwrap();
    let placed = NaiveDate::from_ymd_opt(2024, 5, 6)
        .unwrap()
        .and_hms_opt(7, 8, 9)
        .unwrap();
    assert_eq!(
        sheet.cell(row, 1),
        Some(&SheetCell::Value(CellValue::Timestamp(placed)))
    );
    assert_eq!(sheet.cell(row, 2), Some(&SheetCell::Value(CellValue::Float(5.5))));
    assert_eq!(
        sheet.cell(row, 5),
        Some(&SheetCell::Value(CellValue::Boolean(true)))
    );

    let other = if row == 1 { 2 } else { 1 };
    assert_eq!(sheet.cell(other, 1), None);
    assert_eq!(sheet.cell(other, 5), None);
}

#[test]
fn test_export_workbook() {
    let dir = TempDir::new().unwrap();
    let path = create_duckdb(dir.path());
    let output = dir.path().join("shop.xlsx");

    let db = open(&path, Engine::Auto).unwrap();
    let options = ExportOptions {
        primary: vec!["orders".to_string()],
        ..Default::default()
    };
    let stats = Exporter::new(db.as_ref(), &options)
        .export_to(&output)
        .unwrap();
    assert_eq!(stats.sheets.len(), 3);
    assert_eq!(stats.total_rows(), 2 + 2 + 1);

    let mut workbook: Xlsx<_> = open_workbook(&output).unwrap();
    assert_eq!(
        workbook.sheet_names().to_vec(),
        vec!["orders&customer", "customer", "big_orders"]
    );

    let customer = workbook.worksheet_range("customer").unwrap();
    let rows: Vec<_> = customer.rows().collect();
    assert_eq!(rows[0][2], Data::String("vip".to_string()));
    assert_eq!(rows[1][2], Data::Bool(true));
    assert_eq!(rows[2][2], Data::Empty);

    let joined = workbook.worksheet_range("orders&customer").unwrap();
    let placed_cells: Vec<_> = joined.rows().skip(1).map(|r| r[1].clone()).collect();
    assert!(placed_cells.iter().any(|c| matches!(c, Data::DateTime(_))));
    assert!(placed_cells.iter().any(|c| matches!(c, Data::Empty)));
}

#[test]
fn test_values_without_cell_type_become_text() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fancy.duckdb");
    let conn = duckdb::Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TYPE mood AS ENUM ('sad', 'happy');
         CREATE TABLE fancy (
             m mood,
             span INTERVAL,
             tags VARCHAR[],
             info STRUCT(a INTEGER, b VARCHAR),
             d DATE,
             ts TIMESTAMP
         );
         INSERT INTO fancy VALUES (
             'happy',
             INTERVAL '1 month 2 days 3 hours',
             ['x', 'y'],
             {'a': 1, 'b': 'z'},
             'infinity'::DATE,
             '-infinity'::TIMESTAMP
         );",
    )
    .unwrap();
    drop(conn);

    let db = DuckDbSource::open(&path).unwrap();
    let plan = Exporter::new(&db, &ExportOptions::default()).plan().unwrap();
    let mut sheet = MemorySheet::new();
    let rows = transcribe_planned(&db, &plan[0], &mut sheet, &ExportProgress::hidden()).unwrap();
    assert_eq!(rows, 1);

    let text = |col: u16| sheet.cell(1, col).cloned();
    let expected = [
        "happy",
        "1 month 2 days 03:00:00",
        "[x, y]",
        "{'a': 1, 'b': z}",
        "infinity",
        "-infinity",
    ];
    for (col, value) in expected.iter().enumerate() {
        assert_eq!(
            text(col as u16),
            Some(SheetCell::Value(CellValue::Text(value.to_string()))),
            "column {}",
            col
        );
    }
}
