//! The `ritlens ingest` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::Semaphore;

use ritlens_core::parser::{ExportParser, ParseResult};
use ritlens_sources::config::load_config_from;
use ritlens_sources::{JsonStoreSource, WriteSummary};

use crate::OutputFormat;

/// Errors shown per file before the rest are elided.
const MAX_ERRORS_SHOWN: usize = 10;

#[derive(Debug, Serialize)]
struct FileSummary {
    path: PathBuf,
    total: usize,
    valid: usize,
    invalid: usize,
    warnings: usize,
    header_failure: bool,
}

#[derive(Debug, Serialize)]
struct IngestSummary {
    files: Vec<FileSummary>,
    skipped: Vec<PathBuf>,
    store: WriteSummary,
    duration_ms: u64,
}

pub async fn execute(
    inputs: Vec<PathBuf>,
    store: Option<PathBuf>,
    format: OutputFormat,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();
    let config = load_config_from(config_path.as_deref())?;
    let parser = Arc::new(ExportParser::new(config.parser.clone()).context("invalid [parser] config")?);
    let semaphore = Arc::new(Semaphore::new(config.analytics.parallelism));

    let mut tasks = FuturesUnordered::new();
    for path in inputs {
        let parser = Arc::clone(&parser);
        let semaphore = Arc::clone(&semaphore);
        tasks.push(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
            let task_path = path.clone();
            let parsed = tokio::task::spawn_blocking(move || -> Result<ParseResult> {
                let content = std::fs::read_to_string(&task_path)
                    .with_context(|| format!("failed to read {}", task_path.display()))?;
                Ok(parser.parse(&content))
            })
            .await
            .context("parse task panicked")?;
            Ok::<_, anyhow::Error>((path, parsed))
        });
    }

    let mut parsed = Vec::new();
    let mut skipped = Vec::new();
    while let Some(outcome) = tasks.next().await {
        let (path, result) = outcome?;
        match result {
            Ok(result) => parsed.push((path, result)),
            Err(e) => {
                tracing::warn!("skipping {}: {e:#}", path.display());
                skipped.push(path);
            }
        }
    }
    // completion order is arbitrary
    parsed.sort_by(|a, b| a.0.cmp(&b.0));
    skipped.sort();

    for (path, result) in &parsed {
        report_errors(path, result);
    }

    let records: Vec<_> = parsed
        .iter()
        .flat_map(|(_, result)| result.records.iter().cloned())
        .collect();
    if records.is_empty() {
        anyhow::bail!(
            "no valid records in {} file(s), nothing written",
            parsed.len() + skipped.len()
        );
    }

    let store_dir = store.unwrap_or_else(|| config.store_dir.clone());
    let source = JsonStoreSource::new(&store_dir);
    let written = source
        .write_records(&records)
        .await
        .with_context(|| format!("failed to update store {}", store_dir.display()))?;

    let summary = IngestSummary {
        files: parsed
            .iter()
            .map(|(path, result)| FileSummary {
                path: path.clone(),
                total: result.stats.total,
                valid: result.stats.valid,
                invalid: result.stats.invalid,
                warnings: result.warnings.len(),
                header_failure: result.is_header_failure(),
            })
            .collect(),
        skipped,
        store: written,
        duration_ms: start.elapsed().as_millis() as u64,
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("failed to serialize summary")?
            );
        }
        OutputFormat::Text => print_summary(&summary, &store_dir),
    }

    Ok(())
}

fn report_errors(path: &std::path::Path, result: &ParseResult) {
    if result.errors.is_empty() {
        return;
    }
    if result.is_header_failure() {
        tracing::warn!("{}: header rejected, no rows read", path.display());
    }
    for error in result.errors.iter().take(MAX_ERRORS_SHOWN) {
        match error.row {
            Some(row) => eprintln!(
                "  {}:{row}: {} \"{}\": {}",
                path.display(),
                error.field,
                error.value,
                error.message
            ),
            None => eprintln!("  {}: {}", path.display(), error.message),
        }
    }
    if result.errors.len() > MAX_ERRORS_SHOWN {
        eprintln!(
            "  {}: … {} more error(s)",
            path.display(),
            result.errors.len() - MAX_ERRORS_SHOWN
        );
    }
}

fn print_summary(summary: &IngestSummary, store_dir: &std::path::Path) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec!["File", "Rows", "Valid", "Invalid", "Warnings"]);
    for file in &summary.files {
        let invalid = if file.header_failure {
            "header".to_string()
        } else {
            file.invalid.to_string()
        };
        table.add_row(vec![
            Cell::new(file.path.display()),
            Cell::new(file.total),
            Cell::new(file.valid),
            Cell::new(invalid),
            Cell::new(file.warnings),
        ]);
    }
    for path in &summary.skipped {
        table.add_row(vec![
            Cell::new(path.display()),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("unreadable"),
            Cell::new("-"),
        ]);
    }
    println!("{table}");

    println!(
        "Store {}: {} inserted, {} replaced, {} new student(s), {} record(s) total ({}ms)",
        store_dir.display(),
        summary.store.inserted,
        summary.store.replaced,
        summary.store.new_students,
        summary.store.total_records,
        summary.duration_ms
    );
}
