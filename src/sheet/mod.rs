//! Sheet output.
//!
//! `SheetWriter` is the cell-writing capability the transcriber needs. The
//! workbook implementation writes through `rust_xlsxwriter`; `MemorySheet`
//! keeps cells in memory for inspection.

mod transcriber;

pub use transcriber::*;

use crate::source::CellValue;
use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Datelike;
use rust_xlsxwriter::{Format, Worksheet};
use std::collections::BTreeMap;

/// Largest integer magnitude a spreadsheet number holds exactly (2^53)
pub const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Earliest year Excel's date serials can represent
const MIN_EXCEL_YEAR: i32 = 1900;

/// Zero-based cell writing
pub trait SheetWriter {
    fn write_label(&mut self, row: u32, col: u16, label: &str) -> Result<()>;

    /// Write a typed value; `CellValue::Null` leaves the cell empty
    fn write_value(&mut self, row: u32, col: u16, value: &CellValue) -> Result<()>;
}

/// Number formats for temporal cells, created once per workbook
#[derive(Debug, Clone)]
pub struct CellFormats {
    pub datetime: Format,
    pub date: Format,
    pub time: Format,
}

impl Default for CellFormats {
    fn default() -> Self {
        Self {
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
            date: Format::new().set_num_format("yyyy-mm-dd"),
            time: Format::new().set_num_format("hh:mm:ss"),
        }
    }
}

/// A worksheet of the output workbook
pub struct XlsxSheet<'a> {
    worksheet: &'a mut Worksheet,
    formats: &'a CellFormats,
}

impl<'a> XlsxSheet<'a> {
    pub fn new(worksheet: &'a mut Worksheet, formats: &'a CellFormats) -> Self {
        Self { worksheet, formats }
    }
}

impl SheetWriter for XlsxSheet<'_> {
    fn write_label(&mut self, row: u32, col: u16, label: &str) -> Result<()> {
        self.worksheet.write_string(row, col, label)?;
        Ok(())
    }

    fn write_value(&mut self, row: u32, col: u16, value: &CellValue) -> Result<()> {
        let ws = &mut *self.worksheet;
        match value {
            CellValue::Null => {}
            CellValue::Integer(n) => {
                if n.unsigned_abs() <= MAX_EXACT_INTEGER {
                    ws.write_number(row, col, *n as f64)?;
                } else {
                    ws.write_string(row, col, n.to_string())?;
                }
            }
            CellValue::Float(f) => {
                if f.is_finite() {
                    ws.write_number(row, col, *f)?;
                } else {
                    ws.write_string(row, col, f.to_string())?;
                }
            }
            CellValue::Text(s) => {
                ws.write_string(row, col, s)?;
            }
            CellValue::Boolean(b) => {
                ws.write_boolean(row, col, *b)?;
            }
            CellValue::Bytes(b) => {
                ws.write_string(row, col, BASE64.encode(b))?;
            }
            CellValue::Timestamp(ts) => {
                if ts.year() < MIN_EXCEL_YEAR {
                    ws.write_string(row, col, value.to_string())?;
                } else {
                    ws.write_datetime_with_format(row, col, ts, &self.formats.datetime)?;
                }
            }
            CellValue::Date(d) => {
                if d.year() < MIN_EXCEL_YEAR {
                    ws.write_string(row, col, value.to_string())?;
                } else {
                    ws.write_datetime_with_format(row, col, d, &self.formats.date)?;
                }
            }
            CellValue::Time(t) => {
                ws.write_datetime_with_format(row, col, t, &self.formats.time)?;
            }
        }
        Ok(())
    }
}

/// Content of one in-memory cell
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Label(String),
    Value(CellValue),
}

/// Sheet kept in memory, used by tests and benchmarks
#[derive(Debug, Default)]
pub struct MemorySheet {
    cells: BTreeMap<(u32, u16), SheetCell>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&SheetCell> {
        self.cells.get(&(row, col))
    }

    /// Number of rows up to the last written one
    pub fn row_count(&self) -> u32 {
        self.cells.keys().map(|(r, _)| r + 1).max().unwrap_or(0)
    }

    /// Render every row as text; unwritten cells are empty strings
    pub fn rows(&self) -> Vec<Vec<String>> {
        let width = self.cells.keys().map(|(_, c)| c + 1).max().unwrap_or(0);
        (0..self.row_count())
            .map(|r| {
                (0..width)
                    .map(|c| match self.cell(r, c) {
                        Some(SheetCell::Label(s)) => s.clone(),
                        Some(SheetCell::Value(v)) => v.to_string(),
                        None => String::new(),
                    })
                    .collect()
            })
            .collect()
    }
}

impl SheetWriter for MemorySheet {
    fn write_label(&mut self, row: u32, col: u16, label: &str) -> Result<()> {
        self.cells
            .insert((row, col), SheetCell::Label(label.to_string()));
        Ok(())
    }

    fn write_value(&mut self, row: u32, col: u16, value: &CellValue) -> Result<()> {
        if !value.is_null() {
            self.cells.insert((row, col), SheetCell::Value(value.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sheet_skips_nulls() {
        let mut sheet = MemorySheet::new();
        sheet.write_label(0, 0, "a").unwrap();
        sheet.write_label(0, 1, "b").unwrap();
        sheet.write_value(1, 0, &CellValue::Null).unwrap();
        sheet.write_value(1, 1, &CellValue::Integer(4)).unwrap();

        assert_eq!(sheet.cell(1, 0), None);
        assert_eq!(sheet.rows(), vec![vec!["a", "b"], vec!["", "4"]]);
    }

    #[test]
    fn test_xlsx_sheet_writes_every_kind() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let formats = CellFormats::default();
        let worksheet = workbook.add_worksheet();
        let mut sheet = XlsxSheet::new(worksheet, &formats);

        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let values = [
            CellValue::Integer(1),
            CellValue::Integer(i64::MAX),
            CellValue::Float(f64::NAN),
            CellValue::Text("t".to_string()),
            CellValue::Boolean(true),
            CellValue::Bytes(vec![1, 2]),
            CellValue::Timestamp(date.and_hms_opt(1, 2, 3).unwrap()),
            CellValue::Date(date),
            CellValue::Date(chrono::NaiveDate::from_ymd_opt(1850, 1, 1).unwrap()),
            CellValue::Time(chrono::NaiveTime::from_hms_opt(4, 5, 6).unwrap()),
            CellValue::Null,
        ];
        for (col, value) in values.iter().enumerate() {
            sheet.write_value(0, col as u16, value).unwrap();
        }
    }
}
