mod export;
mod glob_util;

use crate::export::{invoking_user, ExportOptions, ExportYamlConfig};
use crate::source::Engine;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "db2xlsx")]
#[command(author = "Helge Sverre <helge.sverre@gmail.com>")]
#[command(version)]
#[command(
    about = "Export SQLite and DuckDB databases to Excel workbooks",
    long_about = "Export every table and view of a database to its own sheet of an Excel \
workbook. Primary tables (-p) are exported joined with every table they reference \
through foreign keys, recursively."
)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Database files or glob patterns (e.g., *.db, data/**/*.sqlite)
    #[arg(required = true, value_name = "DATABASE")]
    pub databases: Vec<PathBuf>,

    /// Primary tables, each of them recursively joins the tables it references
    #[arg(short, long, num_args = 1.., value_name = "TABLE")]
    pub primary: Vec<String>,

    /// Database engine: auto, sqlite or duckdb (auto-detected if not specified)
    #[arg(short, long)]
    pub engine: Option<Engine>,

    /// Separator between table names in joined sheet names [default: &]
    #[arg(short, long)]
    pub separator: Option<String>,

    /// Write workbooks to this directory instead of next to each database
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// YAML config file (primary, separator, engine, exclude, output_dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tables or views to leave out (comma-separated)
    #[arg(long)]
    pub exclude: Option<String>,

    /// Show the sheets and queries without writing workbooks (dry run)
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Show progress during export
    #[arg(long)]
    pub progress: bool,

    /// Stop on first database that fails
    #[arg(long)]
    pub fail_fast: bool,
}

impl Cli {
    /// Merge command-line values over the config file (if any)
    pub fn options(&self) -> anyhow::Result<ExportOptions> {
        let config = match &self.config {
            Some(path) => ExportYamlConfig::load(path)?,
            None => ExportYamlConfig::default(),
        };
        let mut options = ExportOptions::from_config(config);

        if !self.primary.is_empty() {
            options.primary = self.primary.clone();
        }
        if let Some(separator) = &self.separator {
            options.separator = separator.clone();
        }
        if let Some(engine) = self.engine {
            options.engine = engine;
        }
        if let Some(exclude) = &self.exclude {
            options.exclude = parse_list(exclude);
        }
        if let Some(dir) = &self.output_dir {
            options.output_dir = Some(dir.clone());
        }
        options.dry_run = self.dry_run;
        options.verbose = self.verbose;
        options.progress = self.progress;
        options.author = invoking_user();

        Ok(options)
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let options = cli.options()?;
    export::run(&cli.databases, &options, cli.fail_fast)
}
