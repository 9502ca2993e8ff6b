use super::glob_util::{expand_all, MultiFileResult};
use crate::error::ExportError;
use crate::export::{output_path, ExportOptions, Exporter, PlannedSheet};
use crate::source;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub fn run(databases: &[PathBuf], options: &ExportOptions, fail_fast: bool) -> anyhow::Result<()> {
    let files = expand_all(databases)?;

    if !options.primary.is_empty() && files.len() > 1 {
        return Err(ExportError::MultipleDatabasesWithPrimary.into());
    }

    let total = files.len();
    let mut result = MultiFileResult::new();
    result.total_files = total;
    let start_time = Instant::now();

    for file in &files {
        if !file.is_file() {
            eprintln!("no such file: {}", file.display());
            result.record_missing(file.clone());
            if fail_fast {
                anyhow::bail!("stopped after {} (--fail-fast)", file.display());
            }
            continue;
        }

        match export_database(file, options) {
            Ok(()) => result.record_success(),
            Err(e) => {
                eprintln!("{}: {:#}", file.display(), e);
                result.record_failure(file.clone(), format!("{:#}", e));
                if fail_fast {
                    anyhow::bail!("stopped after {} (--fail-fast)", file.display());
                }
            }
        }
    }

    if total > 1 {
        println!();
        println!("Export Summary:");
        println!("  Total databases: {}", total);
        println!("  Succeeded: {}", result.succeeded);
        println!("  Missing: {}", result.missing);
        println!("  Failed: {}", result.failed);
        println!("  Time: {:.3?}", start_time.elapsed());
        if result.has_failures() {
            println!();
            println!("Not exported:");
            for (path, error) in &result.errors {
                println!("  {}: {}", path.display(), error);
            }
        }
    }

    Ok(())
}

fn export_database(file: &Path, options: &ExportOptions) -> anyhow::Result<()> {
    let db = source::open(file, options.engine)?;
    let exporter = Exporter::new(db.as_ref(), options);
    let output = output_path(file, options.output_dir.as_deref());

    if options.dry_run {
        let sheets = exporter.plan()?;
        println!(
            "{} -> {} (dry run, {} engine)",
            file.display(),
            output.display(),
            db.engine()
        );
        print_plan(&sheets);
        return Ok(());
    }

    if options.verbose {
        for sheet in exporter.plan()? {
            eprintln!("  [{}] {}: {}", sheet.kind, sheet.name, sheet.sql);
        }
    }

    let stats = exporter.export_to(&output)?;
    println!("{} -> {}", file.display(), output.display());
    if options.verbose {
        for sheet in &stats.sheets {
            println!("  {:<31} {:>6} {:>10} rows", sheet.name, sheet.kind, sheet.rows);
        }
    }
    println!("  {}", stats);
    Ok(())
}

fn print_plan(sheets: &[PlannedSheet]) {
    if sheets.is_empty() {
        println!("  (no tables or views)");
        return;
    }
    for sheet in sheets {
        println!("  {} [{}]", sheet.name, sheet.kind);
        println!("    {}", sheet.sql);
    }
}
