//! Output workbook paths and sheet names.

use std::path::{Path, PathBuf};

/// Longest sheet name a workbook accepts
pub const MAX_SHEET_NAME_CHARS: usize = 31;

const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

/// Excel reserves this name for change tracking
const RESERVED_SHEET_NAME: &str = "history";

/// Database extensions replaced by `.xlsx` (compared case-insensitively)
pub const DATABASE_EXTENSIONS: &[&str] = &["db", "sqlite", "sqlite3", "db3", "duckdb", "ddb"];

/// Workbook path for `input`: a known database extension is swapped for
/// `.xlsx`, anything else gets `.xlsx` appended. With `output_dir` the file
/// lands there instead of next to the input.
pub fn output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let known = input
        .extension()
        .map(|e| {
            let e = e.to_string_lossy().to_lowercase();
            DATABASE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false);

    let name = if known {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}.xlsx", stem)
    } else {
        format!("{}.xlsx", file_name)
    };

    match output_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

/// Hands out valid, workbook-unique sheet names.
///
/// Excel compares sheet names case-insensitively. A taken name gets a `~2`,
/// `~3`, ... suffix, shortening the base so the result stays within the
/// character limit.
#[derive(Debug, Default)]
pub struct SheetNames {
    used: Vec<String>,
}

impl SheetNames {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_taken(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        lower == RESERVED_SHEET_NAME || self.used.iter().any(|u| *u == lower)
    }

    /// Reserve a sheet name derived from `name`
    pub fn allocate(&mut self, name: &str) -> String {
        let base = clean_sheet_name(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.is_taken(&candidate) {
            let suffix = format!("~{}", n);
            let keep = MAX_SHEET_NAME_CHARS - suffix.chars().count();
            let prefix: String = base.chars().take(keep).collect();
            candidate = format!("{}{}", prefix.trim_end_matches('\''), suffix);
            n += 1;
        }
        self.used.push(candidate.to_lowercase());
        candidate
    }
}

/// Replace characters a sheet name cannot hold and cut it to the limit.
///
/// Leading and trailing apostrophes are not allowed either; an empty result
/// becomes `Sheet`.
pub fn clean_sheet_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_matches('\'');
    let cut: String = trimmed.chars().take(MAX_SHEET_NAME_CHARS).collect();
    let cut = cut.trim_end_matches('\'');
    if cut.is_empty() {
        "Sheet".to_string()
    } else {
        cut.to_string()
    }
}
