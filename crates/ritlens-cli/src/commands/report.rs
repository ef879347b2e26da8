//! The `ritlens report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};
use tokio_util::sync::CancellationToken;

use ritlens_core::engine::DashboardRequest;
use ritlens_core::model::{BenchmarkTier, LevelFilter};
use ritlens_core::report::DashboardReport;
use ritlens_core::term::TermKey;
use ritlens_sources::config::{create_engine, load_config_from};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    store: Option<PathBuf>,
    term: String,
    grade: u8,
    from: Option<String>,
    cohort: Option<String>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let term = TermKey::parse(&term).with_context(|| format!("invalid --term \"{term}\""))?;
    let transition_from = from
        .map(|label| TermKey::parse(&label).with_context(|| format!("invalid --from \"{label}\"")))
        .transpose()?;

    let config = load_config_from(config_path.as_deref())?;
    let engine = create_engine(&config, store.as_deref())?;

    let request = DashboardRequest {
        term,
        grade,
        transition_from,
        cohort_prefix: cohort,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling report");
            on_interrupt.cancel();
        }
    });

    let report = engine
        .dashboard(&request, &cancel)
        .await
        .with_context(|| format!("failed to build report for {term}, grade {grade}"))?;

    print_report(&report);

    if report.any_truncated() {
        eprintln!(
            "Warning: row cap of {} reached, some sections cover a truncated population.",
            engine.config().row_cap
        );
    }

    if let Some(path) = output {
        report.save_json(&path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

fn fmt1(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.1}")).unwrap_or_else(|| "-".to_string())
}

fn fmt2(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

fn print_report(report: &DashboardReport) {
    let request = &report.request;
    println!(
        "ritlens report {} :: {} grade {} ({} rows, {}ms)",
        report.id,
        request.term,
        request.grade,
        report.rows_read(),
        report.duration_ms
    );

    let dist = &report.distribution;
    let mut table = Table::new();
    table.set_header(vec!["Benchmark", "Students", "%"]);
    for tier in BenchmarkTier::ALL {
        let count = dist.tier(tier);
        table.add_row(vec![
            Cell::new(tier),
            Cell::new(count.count),
            Cell::new(format!("{:.1}", count.percentage)),
        ]);
    }
    println!("\n{table}");
    if dist.missing_pair + dist.missing_threshold > 0 {
        println!(
            "  excluded: {} without both courses, {} without cutoffs",
            dist.missing_pair, dist.missing_threshold
        );
    }

    let mut table = Table::new();
    table.set_header(vec!["Course", "Students", "School", "Norm", "Diff"]);
    for cmp in &report.norm_comparisons {
        table.add_row(vec![
            Cell::new(cmp.course),
            Cell::new(cmp.students),
            Cell::new(format!("{:.1}", cmp.school_average)),
            Cell::new(fmt1(cmp.national_norm)),
            Cell::new(cmp.difference.map(|v| format!("{v:+.1}")).unwrap_or_else(|| "-".into())),
        ]);
    }
    if !report.norm_comparisons.is_empty() {
        println!("\n{table}");
    }
    let unmatched = report.unmatched_norms();
    if !unmatched.is_empty() {
        let courses: Vec<String> = unmatched.iter().map(ToString::to_string).collect();
        println!("  no norm row for: {}", courses.join(", "));
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Growth",
        "Matched",
        "Fall",
        "Spring",
        "Actual",
        "Expected",
        "Index",
        "Met projected %",
    ]);
    for growth in &report.growth {
        table.add_row(vec![
            Cell::new(format!("{} {}", growth.course, growth.academic_year)),
            Cell::new(growth.matched_students),
            Cell::new(fmt1(growth.fall_average)),
            Cell::new(fmt1(growth.spring_average)),
            Cell::new(fmt1(growth.actual_growth)),
            Cell::new(fmt1(growth.expected_growth)),
            Cell::new(fmt2(growth.growth_index)),
            Cell::new(fmt1(growth.fall_to_spring.met_projected_pct)),
        ]);
    }
    println!("\n{table}");

    for goals in &report.goals {
        let Some(all) = goals.levels.iter().find(|l| l.level == LevelFilter::All) else {
            continue;
        };
        if all.students == 0 {
            continue;
        }
        let mut table = Table::new();
        table.set_header(vec![
            format!("{} goal", goals.course),
            "Average".to_string(),
            "Students".to_string(),
            "vs overall".to_string(),
        ]);
        for stat in &all.goals {
            table.add_row(vec![
                Cell::new(&stat.goal),
                Cell::new(fmt1(stat.average)),
                Cell::new(stat.students),
                Cell::new(stat.vs_overall.map(|v| format!("{v:+.1}")).unwrap_or_else(|| "-".into())),
            ]);
        }
        println!("\n{table}");
    }

    let lexile = &report.lexile;
    if lexile.count > 0 {
        let mut table = Table::new();
        table.set_header(vec!["Lexile band", "Students", "%"]);
        for band in lexile.bands.iter().filter(|b| b.count > 0) {
            table.add_row(vec![
                Cell::new(&band.label),
                Cell::new(band.count),
                Cell::new(format!("{:.1}", band.percentage)),
            ]);
        }
        println!("\n{table}");
        println!(
            "  mean {} median {} sd {} r(RIT, Lexile) {}",
            fmt1(lexile.mean),
            fmt1(lexile.median),
            fmt1(lexile.std_dev),
            fmt2(lexile.correlation)
        );
    }

    let quality = &report.quality;
    println!(
        "\nTest quality: {} normal ({:.1}%), {} caution ({:.1}%), {} flagged ({:.1}%) at >{:.0}% rapid guessing",
        quality.normal,
        quality.normal_pct,
        quality.caution,
        quality.caution_pct,
        quality.flagged,
        quality.flagged_pct,
        quality.threshold
    );

    if let Some(matrix) = &report.transition {
        let mut table = Table::new();
        let mut header = vec![format!("{} \\ {}", matrix.from, matrix.to)];
        header.extend(BenchmarkTier::ALL.iter().map(|t| t.to_string()));
        table.set_header(header);
        for from in BenchmarkTier::ALL {
            let mut row = vec![from.to_string()];
            row.extend(
                BenchmarkTier::ALL
                    .iter()
                    .map(|to| matrix.count(from, *to).to_string()),
            );
            table.add_row(row);
        }
        println!("\n{table}");
        println!(
            "  improved {} same {} declined {}",
            matrix.improved, matrix.same, matrix.declined
        );
    }

    if let Some(cohort) = &report.cohort {
        let mut table = Table::new();
        table.set_header(vec![
            format!("Cohort {}", cohort.prefix),
            "Students".to_string(),
            "Reading".to_string(),
            "Language".to_string(),
            "Combined".to_string(),
            "Norm".to_string(),
        ]);
        for point in &cohort.points {
            table.add_row(vec![
                Cell::new(point.term),
                Cell::new(point.students),
                Cell::new(fmt1(point.reading_average)),
                Cell::new(fmt1(point.language_average)),
                Cell::new(fmt1(point.combined_average)),
                Cell::new(fmt1(point.norm_average)),
            ]);
        }
        println!("\n{table}");
        if let Some(growth) = cohort.total_growth {
            println!(
                "  total growth {growth:+.1}, vs norm {}",
                cohort
                    .vs_norm
                    .map(|v| format!("{v:+.1}"))
                    .unwrap_or_else(|| "-".into())
            );
        }
    }
}
