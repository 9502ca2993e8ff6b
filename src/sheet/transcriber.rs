//! Streams a query result into a sheet.

use super::SheetWriter;
use crate::error::ExportError;
use crate::progress::ExportProgress;
use crate::source::{CellValue, DataSource, ResultColumn, RowVisitor};
use anyhow::{Context, Result};

/// Zero-based row of the header; data starts on the next row
pub const HEADER_ROW: u32 = 0;

/// Writes the header once, then one sheet row per result row.
///
/// With `labels` set, those replace the result's column names in the header
/// (qualified `table.column` labels for joined exports).
pub struct Transcriber<'a, W: SheetWriter + ?Sized> {
    sheet: &'a mut W,
    labels: Option<&'a [String]>,
    name: &'a str,
    progress: Option<&'a ExportProgress>,
    next_row: u32,
    rows: u64,
}

impl<'a, W: SheetWriter + ?Sized> Transcriber<'a, W> {
    pub fn new(sheet: &'a mut W, name: &'a str) -> Self {
        Self {
            sheet,
            labels: None,
            name,
            progress: None,
            next_row: HEADER_ROW + 1,
            rows: 0,
        }
    }

    pub fn with_labels(mut self, labels: &'a [String]) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_progress(mut self, progress: &'a ExportProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Data rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Run `sql` against `source` and write its result
    pub fn run(mut self, source: &dyn DataSource, sql: &str) -> Result<u64> {
        source
            .stream(sql, &mut self)
            .with_context(|| format!("Failed to export sheet {}", self.name))?;
        Ok(self.rows)
    }
}

fn column_index(i: usize) -> Result<u16> {
    u16::try_from(i).map_err(|_| anyhow::anyhow!("too many columns: {}", i + 1))
}

impl<W: SheetWriter + ?Sized> RowVisitor for Transcriber<'_, W> {
    fn columns(&mut self, columns: &[ResultColumn]) -> Result<()> {
        if let Some(labels) = self.labels {
            if labels.len() != columns.len() {
                return Err(ExportError::HeaderMismatch {
                    labels: labels.len(),
                    columns: columns.len(),
                }
                .into());
            }
        }

        for (i, column) in columns.iter().enumerate() {
            let label = match self.labels {
                Some(labels) => labels[i].as_str(),
                None => column.name.as_str(),
            };
            self.sheet.write_label(HEADER_ROW, column_index(i)?, label)?;
        }
        Ok(())
    }

    fn row(&mut self, values: &[CellValue]) -> Result<()> {
        for (i, value) in values.iter().enumerate() {
            self.sheet.write_value(self.next_row, column_index(i)?, value)?;
        }
        self.next_row += 1;
        self.rows += 1;
        if let Some(progress) = self.progress {
            progress.row(self.name, self.rows);
        }
        Ok(())
    }
}
