//! Typed cell values and the kind-guided conversions shared by all backends.

use crate::schema::ColumnKind;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// One scanned value, tagged with its representation
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl CellValue {
    /// Integer storage, reinterpreted as a boolean in boolean columns
    pub fn from_integer(kind: ColumnKind, value: i64) -> Self {
        match (kind, value) {
            (ColumnKind::Boolean, 0) => CellValue::Boolean(false),
            (ColumnKind::Boolean, 1) => CellValue::Boolean(true),
            _ => CellValue::Integer(value),
        }
    }

    /// Text storage, parsed when the column declares a temporal or boolean type.
    ///
    /// Text that does not parse stays text.
    pub fn from_text(kind: ColumnKind, value: &str) -> Self {
        let parsed = match kind {
            ColumnKind::Timestamp => parse_timestamp(value).map(CellValue::Timestamp),
            ColumnKind::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(CellValue::Date)
                .or_else(|| parse_timestamp(value).map(CellValue::Timestamp)),
            ColumnKind::Time => TIME_FORMATS
                .iter()
                .find_map(|f| NaiveTime::parse_from_str(value, f).ok())
                .map(CellValue::Time),
            ColumnKind::Boolean => match value.to_ascii_lowercase().as_str() {
                "true" => Some(CellValue::Boolean(true)),
                "false" => Some(CellValue::Boolean(false)),
                _ => None,
            },
            _ => None,
        };
        parsed.unwrap_or_else(|| CellValue::Text(value.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Float(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Boolean(b) => write!(f, "{}", b),
            CellValue::Bytes(b) => write!(f, "<blob {} bytes>", b.len()),
            CellValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            CellValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
        }
    }
}
