//! Glob pattern expansion for database arguments.
//!
//! Expands patterns like `*.db` or `data/**/*.sqlite` into lists of matching
//! file paths. Literal paths are passed through untouched, even when they do
//! not exist, so the caller can report them per database.

use std::path::{Path, PathBuf};

/// Result of expanding a database argument (either a literal path or glob pattern).
#[derive(Debug)]
pub struct ExpandedFiles {
    pub files: Vec<PathBuf>,
}

/// Check if a path string contains glob pattern characters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Expand a file path or glob pattern into a list of files.
///
/// A glob that matches nothing expands to the pattern itself, the same way
/// a shell leaves an unmatched pattern alone.
///
/// # Errors
///
/// Returns an error if the glob pattern is invalid or a matched path cannot
/// be read.
pub fn expand_file_pattern(pattern: &Path) -> anyhow::Result<ExpandedFiles> {
    let pattern_str = pattern.to_string_lossy();

    if !is_glob_pattern(&pattern_str) {
        return Ok(ExpandedFiles {
            files: vec![pattern.to_path_buf()],
        });
    }

    let entries: Vec<_> = glob::glob(&pattern_str)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern_str, e))?
        .collect();

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                anyhow::bail!("error reading path for pattern '{}': {}", pattern_str, e);
            }
        }
    }

    if files.is_empty() {
        files.push(pattern.to_path_buf());
    }

    files.sort();

    Ok(ExpandedFiles { files })
}

/// Expand every argument, keeping argument order
pub fn expand_all(patterns: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        files.extend(expand_file_pattern(pattern)?.files);
    }
    Ok(files)
}

/// Outcome of exporting several databases.
#[derive(Debug, Default)]
pub struct MultiFileResult {
    pub total_files: usize,
    pub succeeded: usize,
    pub missing: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl MultiFileResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_missing(&mut self, path: PathBuf) {
        self.missing += 1;
        self.errors.push((path, "no such file".to_string()));
    }

    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.missing > 0
    }
}
