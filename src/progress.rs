//! Shared progress reporting for exports.
//!
//! Wraps an optional `indicatif` spinner so callers can report progress
//! unconditionally; when progress is disabled every call is a no-op.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Rows between spinner message updates
const ROW_TICK: u64 = 1_000;

pub struct ExportProgress {
    bar: Option<ProgressBar>,
}

impl ExportProgress {
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(pb) }
    }

    pub fn hidden() -> Self {
        Self { bar: None }
    }

    pub fn start_sheet(&self, sheet: &str) {
        if let Some(pb) = &self.bar {
            pb.set_message(format!("Exporting {}...", sheet));
        }
    }

    /// Called after every row; only every `ROW_TICK`th row updates the message
    pub fn row(&self, sheet: &str, rows: u64) {
        if rows % ROW_TICK != 0 {
            return;
        }
        if let Some(pb) = &self.bar {
            pb.set_message(format!("Exporting {}... {} rows", sheet, rows));
        }
    }

    pub fn finish(&self) {
        if let Some(pb) = &self.bar {
            pb.finish_and_clear();
        }
    }
}

impl Default for ExportProgress {
    fn default() -> Self {
        Self::hidden()
    }
}
