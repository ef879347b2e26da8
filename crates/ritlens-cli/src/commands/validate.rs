//! The `ritlens validate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::Table;

use ritlens_core::parser::ExportParser;
use ritlens_sources::config::load_config_from;

/// Row errors printed before the rest are summarized.
const MAX_ERRORS_SHOWN: usize = 20;

pub fn execute(input: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let parser = ExportParser::new(config.parser).context("invalid [parser] config")?;
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;

    let result = parser.parse(&content);
    let stats = &result.stats;
    println!(
        "{}: {} row(s), {} valid, {} invalid",
        input.display(),
        stats.total,
        stats.valid,
        stats.invalid
    );

    if stats.valid > 0 {
        let mut table = Table::new();
        table.set_header(vec!["Breakdown", "Key", "Records"]);
        for (term, count) in &stats.by_term {
            table.add_row(vec!["term".to_string(), term.to_string(), count.to_string()]);
        }
        for (grade, count) in &stats.by_grade {
            table.add_row(vec!["grade".to_string(), grade.to_string(), count.to_string()]);
        }
        for (course, count) in &stats.by_course {
            table.add_row(vec!["course".to_string(), course.to_string(), count.to_string()]);
        }
        println!("{table}");
    }

    for warning in &result.warnings {
        println!(
            "  line {} WARNING: {} \"{}\": {}",
            warning.row, warning.field, warning.value, warning.message
        );
    }

    for error in result.errors.iter().take(MAX_ERRORS_SHOWN) {
        match error.row {
            Some(row) => println!(
                "  line {row} ERROR: {} \"{}\": {}",
                error.field, error.value, error.message
            ),
            None => println!("  ERROR: {}", error.message),
        }
    }
    if result.errors.len() > MAX_ERRORS_SHOWN {
        println!(
            "  … {} more error(s)",
            result.errors.len() - MAX_ERRORS_SHOWN
        );
    }

    if result.is_header_failure() {
        anyhow::bail!("{} is not a usable export", input.display());
    }
    if !result.errors.is_empty() {
        anyhow::bail!("{} invalid row(s) found", stats.invalid);
    }

    println!("Export valid.");
    Ok(())
}
