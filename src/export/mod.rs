//! Workbook export for a single database.
//!
//! Each primary table becomes one joined sheet (the table plus every table it
//! reaches through foreign keys). Every remaining table and view is then
//! exported verbatim, one sheet each, in creation order.
//!
//! # Example
//!
//! ```ignore
//! use db2xlsx::export::{ExportOptions, Exporter};
//! use db2xlsx::source::{open, Engine};
//! use std::path::Path;
//!
//! let db = open(Path::new("shop.db"), Engine::Auto)?;
//! let options = ExportOptions {
//!     primary: vec!["orders".to_string()],
//!     ..Default::default()
//! };
//! let stats = Exporter::new(db.as_ref(), &options).export_to(Path::new("shop.xlsx"))?;
//! println!("{}", stats);
//! ```

mod config;
mod naming;

pub use config::ExportYamlConfig;
pub use naming::{
    clean_sheet_name, output_path, SheetNames, DATABASE_EXTENSIONS, MAX_SHEET_NAME_CHARS,
};

use crate::progress::ExportProgress;
use crate::schema::{same_name, select_all, ExportUnit, ObjectKind, DEFAULT_SHEET_SEPARATOR};
use crate::sheet::{CellFormats, SheetWriter, Transcriber, XlsxSheet};
use crate::source::{DataSource, Engine};
use anyhow::{Context, Result};
use rust_xlsxwriter::{DocProperties, Workbook};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Options for exporting one database
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Primary tables, each exported joined with its ancestors
    pub primary: Vec<String>,
    /// Separator between table names of a joined sheet
    pub separator: String,
    pub engine: Engine,
    /// Tables and views skipped in the verbatim pass
    pub exclude: Vec<String>,
    /// Directory for workbooks (default: next to the database)
    pub output_dir: Option<PathBuf>,
    /// Plan sheets without reading rows or writing a workbook
    pub dry_run: bool,
    pub verbose: bool,
    /// Show a spinner while rows are written
    pub progress: bool,
    /// Workbook author; left unset when `None`
    pub author: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            primary: Vec::new(),
            separator: DEFAULT_SHEET_SEPARATOR.to_string(),
            engine: Engine::Auto,
            exclude: Vec::new(),
            output_dir: None,
            dry_run: false,
            verbose: false,
            progress: false,
            author: None,
        }
    }
}

impl ExportOptions {
    /// Options seeded from a config file; command-line values are applied on top
    pub fn from_config(config: ExportYamlConfig) -> Self {
        let defaults = Self::default();
        Self {
            primary: config.primary,
            separator: config.separator.unwrap_or(defaults.separator),
            engine: config.engine.unwrap_or(defaults.engine),
            exclude: config.exclude,
            output_dir: config.output_dir,
            ..defaults
        }
    }

    fn is_primary(&self, name: &str) -> bool {
        self.primary.iter().any(|p| same_name(p, name))
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|e| same_name(e, name))
    }
}

/// One sheet to be written: its name, query and (for joins) header labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSheet {
    pub name: String,
    pub sql: String,
    pub labels: Option<Vec<String>>,
    pub kind: SheetKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    /// A primary table joined with its ancestors
    Joined,
    /// A table or view as-is
    Verbatim(ObjectKind),
}

impl fmt::Display for SheetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetKind::Joined => write!(f, "join"),
            SheetKind::Verbatim(kind) => write!(f, "{}", kind),
        }
    }
}

/// Rows written to one sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetReport {
    pub name: String,
    pub kind: SheetKind,
    pub rows: u64,
}

/// Summary of one export
#[derive(Debug, Clone, Default)]
pub struct ExportStats {
    pub sheets: Vec<SheetReport>,
    pub elapsed: Duration,
}

impl ExportStats {
    pub fn total_rows(&self) -> u64 {
        self.sheets.iter().map(|s| s.rows).sum()
    }
}

impl fmt::Display for ExportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sheets, {} rows in {:.3?}",
            self.sheets.len(),
            self.total_rows(),
            self.elapsed
        )
    }
}

/// Exports one open database into a workbook
pub struct Exporter<'a> {
    source: &'a dyn DataSource,
    options: &'a ExportOptions,
}

impl<'a> Exporter<'a> {
    pub fn new(source: &'a dyn DataSource, options: &'a ExportOptions) -> Self {
        Self { source, options }
    }

    /// Resolve every sheet in output order.
    ///
    /// Joined sheets come first, in the order the primary tables were given.
    /// A primary table named twice gets one sheet. Sheet names are final:
    /// cleaned, truncated and unique within the workbook. An unknown primary
    /// table fails the whole plan.
    pub fn plan(&self) -> Result<Vec<PlannedSheet>> {
        let mut sheets = Vec::new();
        let mut names = SheetNames::new();
        let mut seen: Vec<&str> = Vec::new();

        for primary in &self.options.primary {
            if seen.iter().any(|s| same_name(s, primary)) {
                continue;
            }
            seen.push(primary);
            let unit = ExportUnit::resolve(self.source, primary)?;
            let sql = unit
                .to_sql()
                .with_context(|| format!("Failed to build query for {}", primary))?;
            sheets.push(PlannedSheet {
                name: names.allocate(&unit.sheet_name(&self.options.separator)),
                sql,
                labels: Some(unit.labels()),
                kind: SheetKind::Joined,
            });
        }

        for object in self.source.objects()? {
            if self.options.is_primary(&object.name) || self.options.is_excluded(&object.name) {
                continue;
            }
            sheets.push(PlannedSheet {
                name: names.allocate(&object.name),
                sql: select_all(&object.name),
                labels: None,
                kind: SheetKind::Verbatim(object.kind),
            });
        }

        Ok(sheets)
    }

    /// Write every planned sheet into `workbook`
    pub fn write_workbook(
        &self,
        workbook: &mut Workbook,
        progress: &ExportProgress,
    ) -> Result<Vec<SheetReport>> {
        let formats = CellFormats::default();
        let mut reports = Vec::new();

        for planned in self.plan()? {
            progress.start_sheet(&planned.name);
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(&planned.name)
                .with_context(|| format!("Invalid sheet name: {}", planned.name))?;
            let mut sheet = XlsxSheet::new(worksheet, &formats);
            let rows = transcribe_planned(self.source, &planned, &mut sheet, progress)?;
            reports.push(SheetReport {
                name: planned.name,
                kind: planned.kind,
                rows,
            });
        }

        Ok(reports)
    }

    /// Export into a workbook saved at `output`.
    ///
    /// The workbook is assembled in memory first, so no file is written when
    /// any sheet or the assembly itself fails.
    pub fn export_to(&self, output: &Path) -> Result<ExportStats> {
        let start = Instant::now();
        let progress = ExportProgress::new(self.options.progress);

        let mut workbook = Workbook::new();
        let result = self.write_workbook(&mut workbook, &progress);
        progress.finish();
        let sheets = result?;

        if let Some(author) = &self.options.author {
            let properties = DocProperties::new().set_author(author);
            workbook.set_properties(&properties);
        }
        let buffer = workbook
            .save_to_buffer()
            .with_context(|| format!("Failed to assemble workbook: {}", output.display()))?;

        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create output directory: {}", parent.display())
                })?;
            }
        }
        std::fs::write(output, buffer)
            .with_context(|| format!("Failed to save workbook: {}", output.display()))?;

        Ok(ExportStats {
            sheets,
            elapsed: start.elapsed(),
        })
    }
}

/// Stream one planned sheet into any sheet writer
pub fn transcribe_planned<W: SheetWriter + ?Sized>(
    source: &dyn DataSource,
    planned: &PlannedSheet,
    sheet: &mut W,
    progress: &ExportProgress,
) -> Result<u64> {
    let transcriber = Transcriber::new(sheet, &planned.name).with_progress(progress);
    let transcriber = match &planned.labels {
        Some(labels) => transcriber.with_labels(labels),
        None => transcriber,
    };
    transcriber.run(source, &planned.sql)
}

/// Name of the user running the export.
///
/// `USER` and `USERNAME` are tried first. On Unix the account database is
/// consulted next, which covers cron jobs and containers without either.
pub fn invoking_user() -> Option<String> {
    ["USER", "USERNAME"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|name| !name.is_empty())
        .or_else(account_name)
}

#[cfg(unix)]
fn account_name() -> Option<String> {
    use nix::unistd::{Uid, User};

    match User::from_uid(Uid::current()) {
        Ok(Some(user)) if !user.name.is_empty() => Some(user.name),
        _ => None,
    }
}

#[cfg(not(unix))]
fn account_name() -> Option<String> {
    None
}
