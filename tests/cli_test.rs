//! Integration tests for the db2xlsx binary
//!
//! Tests cover:
//! - Usage output
//! - Missing database files
//! - Primary tables with several databases
//! - Output naming and --output-dir
//! - Dry runs, glob patterns and --fail-fast

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // Remove test binary name
    path.pop(); // Remove deps
    path.push("db2xlsx");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("Failed to execute db2xlsx")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn create_db(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE x (a INT PRIMARY KEY, b TEXT);
         CREATE TABLE y (d INT, f INT REFERENCES x(a));
         INSERT INTO x VALUES (1, 'first');
         INSERT INTO y VALUES (6, 1);",
    )
    .unwrap();
    path
}

#[test]
fn test_help() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Usage: db2xlsx"));
    assert!(out.contains("--primary <TABLE>"));
}

#[test]
fn test_no_arguments_prints_usage() {
    let output = run(&[]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Usage: db2xlsx"));
}

#[test]
fn test_missing_file_is_reported() {
    let output = run(&["/nonexistent/none.db"]);
    assert!(output.status.success());
    assert!(stderr(&output).contains("no such file: /nonexistent/none.db"));
}

#[test]
fn test_primary_with_several_databases() {
    let dir = TempDir::new().unwrap();
    let a = create_db(dir.path(), "a.db");
    let b = create_db(dir.path(), "b.db");

    let output = run(&[a.to_str().unwrap(), b.to_str().unwrap(), "-p", "y"]);

    assert!(!output.status.success());
    assert!(stderr(&output)
        .contains("more than one database included while primary tables specified"));
    assert!(!dir.path().join("a.xlsx").exists());
    assert!(!dir.path().join("b.xlsx").exists());
}

#[test]
fn test_export_writes_workbook_next_to_database() {
    let dir = TempDir::new().unwrap();
    let db = create_db(dir.path(), "shop.db");

    let output = run(&[db.to_str().unwrap(), "-p", "y"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let xlsx = dir.path().join("shop.xlsx");
    assert!(xlsx.exists());
    let out = stdout(&output);
    assert!(out.contains(&format!("{} -> {}", db.display(), xlsx.display())));
    assert!(out.contains("2 sheets, 2 rows"));
}

#[test]
fn test_output_dir() {
    let dir = TempDir::new().unwrap();
    let db = create_db(dir.path(), "shop.sqlite");
    let out_dir = dir.path().join("out");

    let output = run(&[db.to_str().unwrap(), "-o", out_dir.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(out_dir.join("shop.xlsx").exists());
}

#[test]
fn test_unknown_primary_reports_database() {
    let dir = TempDir::new().unwrap();
    let db = create_db(dir.path(), "shop.db");

    let output = run(&[db.to_str().unwrap(), "-p", "w"]);

    assert!(output.status.success());
    assert!(stderr(&output).contains(&format!("{}: no such table or view: w", db.display())));
    assert!(!dir.path().join("shop.xlsx").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let db = create_db(dir.path(), "shop.db");

    let output = run(&[db.to_str().unwrap(), "--dry-run", "-p", "y"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("y&x [join]"));
    assert!(out.contains(r#"INNER JOIN "x" ON "y"."f" = "x"."a""#));
    assert!(!dir.path().join("shop.xlsx").exists());
}

#[test]
fn test_glob_pattern_exports_each_database() {
    let dir = TempDir::new().unwrap();
    create_db(dir.path(), "a.db");
    create_db(dir.path(), "b.db");

    let pattern = dir.path().join("*.db");
    let output = run(&[pattern.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(dir.path().join("a.xlsx").exists());
    assert!(dir.path().join("b.xlsx").exists());
    assert!(stdout(&output).contains("Total databases: 2"));
}

#[test]
fn test_fail_fast_stops_after_first_failure() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("a.db");
    fs::write(&bad, b"this is not a database at all, not even close").unwrap();
    create_db(dir.path(), "b.db");

    let pattern = dir.path().join("*.db");
    let output = run(&[pattern.to_str().unwrap(), "--fail-fast"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("--fail-fast"));
    assert!(!dir.path().join("b.xlsx").exists());
}

#[test]
fn test_summary_lists_databases_not_exported() {
    let dir = TempDir::new().unwrap();
    let bad = dir.path().join("a.db");
    fs::write(&bad, b"this is not a database at all, not even close").unwrap();
    create_db(dir.path(), "b.db");
    let missing = dir.path().join("gone.db");

    let pattern = dir.path().join("*.db");
    let output = run(&[pattern.to_str().unwrap(), missing.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    assert!(out.contains("Total databases: 3"));
    assert!(out.contains("Not exported:"));
    assert!(out.contains(&format!("  {}: ", bad.display())));
    assert!(out.contains(&format!("  {}: no such file", missing.display())));
    assert!(dir.path().join("b.xlsx").exists());
}
