//! Command-line interface module for datetidy.
//!
//! This module handles all CLI-related functionality:
//! - Command parsing via clap
//! - Engine construction and batch orchestration
//! - Rendering batch reports, previews, and undo results
//! - The interactive undo prompt
//!
//! The engine keeps its history in memory only, so undo is offered right
//! after a batch (via `--interactive`) rather than as a separate command.

use crate::date_resolver::DateFormat;
use crate::engine::{BatchReport, OperationKind, PlannedFile, SortEngine};
use crate::output::OutputFormatter;
use crate::undo::UndoReport;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Sort files into date-named subdirectories by copy or move.
#[derive(Parser)]
#[command(name = "datetidy", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy files into date buckets, leaving the source untouched.
    Copy(BatchArgs),
    /// Move files into date buckets, emptying the source.
    Move(BatchArgs),
    /// Show where files would go without touching anything.
    Preview(PreviewArgs),
}

#[derive(Args)]
pub struct BatchArgs {
    /// Source directory to read files from (non-recursive).
    pub source: PathBuf,
    /// Destination root under which date buckets are created.
    pub dest: PathBuf,
    /// Date bucket layout: DD-MM-YYYY, MM-DD-YYYY or YYYY-MM-DD.
    /// Unrecognized values fall back to YYYY-MM-DD.
    #[arg(long, default_value = "YYYY-MM-DD")]
    pub format: String,
    /// Print the batch report as JSON instead of styled text.
    #[arg(long)]
    pub json: bool,
    /// Offer to undo the batch before exiting.
    #[arg(long)]
    pub interactive: bool,
}

#[derive(Args)]
pub struct PreviewArgs {
    /// Source directory to read files from (non-recursive).
    pub source: PathBuf,
    /// Destination root under which date buckets would be created.
    pub dest: PathBuf,
    /// Date bucket layout: DD-MM-YYYY, MM-DD-YYYY or YYYY-MM-DD.
    /// Unrecognized values fall back to YYYY-MM-DD.
    #[arg(long, default_value = "YYYY-MM-DD")]
    pub format: String,
    /// Print the preview as JSON instead of styled text.
    #[arg(long)]
    pub json: bool,
}

/// Runs the parsed CLI command.
pub fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Copy(args) => run_batch(OperationKind::Copy, args),
        Command::Move(args) => run_batch(OperationKind::Move, args),
        Command::Preview(args) => run_preview(args),
    }
}

fn run_batch(kind: OperationKind, args: BatchArgs) -> Result<(), String> {
    let format = DateFormat::from_label(&args.format);
    let mut engine = SortEngine::new(&args.source, &args.dest, format);

    if !args.json {
        OutputFormatter::info(&format!(
            "Sorting files from {} into {} ({} buckets)",
            args.source.display(),
            args.dest.display(),
            format.label()
        ));
    }

    let spinner = (!args.json).then(|| {
        OutputFormatter::spinner(&format!("Running {} batch...", kind.verb()))
    });
    let result = match kind {
        OperationKind::Copy => engine.copy(),
        OperationKind::Move => engine.move_files(),
    };
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let report = result.map_err(|e| e.to_string())?;

    if args.json {
        println!("{}", to_json(&report)?);
    } else {
        render_batch_report(kind, &report);
    }

    if args.interactive && !report.entries.is_empty() && prompt_undo()? {
        let undo_report = engine.undo_last();
        render_undo_report(&undo_report);
    }

    Ok(())
}

fn run_preview(args: PreviewArgs) -> Result<(), String> {
    let format = DateFormat::from_label(&args.format);
    let engine = SortEngine::new(&args.source, &args.dest, format);

    let planned = engine.preview().map_err(|e| e.to_string())?;

    if args.json {
        println!("{}", to_json(&planned)?);
        return Ok(());
    }

    OutputFormatter::info(&format!(
        "Preview: {} -> {} ({} buckets)",
        args.source.display(),
        args.dest.display(),
        format.label()
    ));

    if planned.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return Ok(());
    }

    let mut by_bucket: BTreeMap<&str, Vec<&PlannedFile>> = BTreeMap::new();
    for file in &planned {
        by_bucket.entry(&file.date_bucket).or_default().push(file);
    }

    for (bucket, files) in &by_bucket {
        OutputFormatter::header(&format!("{}/ ({} files)", bucket, files.len()));
        for file in files {
            OutputFormatter::plain(&format!(
                " - {} ({})",
                file.name,
                file.date_source.describe()
            ));
        }
    }

    OutputFormatter::plain(&format!(
        "\n{} files across {} buckets. No files were modified.",
        planned.len(),
        by_bucket.len()
    ));
    Ok(())
}

fn render_batch_report(kind: OperationKind, report: &BatchReport) {
    for entry in &report.entries {
        OutputFormatter::plain(&format!(
            " - {} -> {}/ ({})",
            entry.name,
            entry.date_bucket,
            entry.date_source.describe()
        ));
    }

    for error in &report.errors {
        OutputFormatter::error(&error.to_string());
    }

    if !report.entries.is_empty() {
        let mut bucket_counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &report.entries {
            *bucket_counts.entry(entry.date_bucket.clone()).or_insert(0) += 1;
        }
        OutputFormatter::bucket_table(&bucket_counts, report.entries.len());
    }

    if report.entries.is_empty() && report.errors.is_empty() {
        OutputFormatter::plain("No files found to organize.");
    } else if report.errors.is_empty() {
        OutputFormatter::success(&format!(
            "Successfully {} {} files.",
            kind.verb_past(),
            report.entries.len()
        ));
    } else {
        OutputFormatter::warning(&format!(
            "{} {} files with {} errors. Review the errors above.",
            kind.verb_past(),
            report.entries.len(),
            report.errors.len()
        ));
    }
}

fn render_undo_report(report: &UndoReport) {
    for warning in &report.warnings {
        OutputFormatter::warning(warning);
    }

    if report.undone {
        OutputFormatter::success(&format!(
            "Undo complete: {} files restored, {} empty directories removed.",
            report.restored, report.removed_dirs
        ));
    } else {
        let reason = report.failure.as_deref().unwrap_or("unknown failure");
        OutputFormatter::error(&format!("Undo failed: {}", reason));
    }
}

fn prompt_undo() -> Result<bool, String> {
    print!("Undo this operation? [y/N] ");
    io::stdout()
        .flush()
        .map_err(|e| format!("Failed to flush stdout: {}", e))?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| format!("Failed to read answer: {}", e))?;

    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to serialize report: {}", e))
}
