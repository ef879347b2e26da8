//! Descriptive statistics and the grouped-average views built on them.
//!
//! Everything here is a pure function of the records passed in. Empty input
//! yields `None` or an empty collection, never a zero that could be mistaken
//! for a computed value.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::growth::NormTable;
use crate::model::{Course, JoinedRecord, LevelFilter};
use crate::term::TermKey;

/// Arithmetic mean, `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median, `None` for empty input.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Population standard deviation around a pre-computed mean.
pub fn stddev(values: &[f64], mean: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Pearson correlation of paired samples.
///
/// `None` with fewer than two pairs or when either side has zero variance.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentages to one decimal that sum to exactly 100.0 (largest remainder).
///
/// All zeros when the counts sum to zero.
pub fn percentages(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return vec![0.0; counts.len()];
    }

    // Work in tenths of a percent.
    let exact: Vec<f64> = counts
        .iter()
        .map(|&c| c as f64 * 1000.0 / total as f64)
        .collect();
    let mut tenths: Vec<u64> = exact.iter().map(|e| e.floor() as u64).collect();
    let assigned: u64 = tenths.iter().sum();

    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().take(1000u64.saturating_sub(assigned) as usize) {
        tenths[i] += 1;
    }

    tenths.into_iter().map(|t| t as f64 / 10.0).collect()
}

/// One record per student: the one with the latest test date wins, and among
/// equal (or missing) dates the one that comes last.
pub fn latest_by_student<'a>(
    records: impl IntoIterator<Item = &'a JoinedRecord>,
) -> BTreeMap<&'a str, &'a JoinedRecord> {
    let mut latest: BTreeMap<&'a str, &'a JoinedRecord> = BTreeMap::new();
    for jr in records {
        match latest.get(jr.record.student_id.as_str()) {
            Some(existing) if existing.record.test_date > jr.record.test_date => {}
            _ => {
                latest.insert(jr.record.student_id.as_str(), jr);
            }
        }
    }
    latest
}

// ---------------------------------------------------------------------------
// Grouped averages
// ---------------------------------------------------------------------------

/// Dimension for [`group_averages`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Level,
    Grade,
    Course,
}

/// Mean RIT for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAverage {
    pub group: String,
    pub students: usize,
    pub records: usize,
    pub average: Option<f64>,
}

/// Mean RIT per group for one term. Records with no value for the grouping
/// dimension (an unleveled student) land in an `"Unassigned"` group.
pub fn group_averages(records: &[JoinedRecord], term: TermKey, by: GroupBy) -> Vec<GroupAverage> {
    let mut groups: BTreeMap<String, (BTreeSet<&str>, Vec<f64>)> = BTreeMap::new();

    for jr in records.iter().filter(|jr| jr.record.term == term) {
        let key = match by {
            GroupBy::Level => jr
                .student
                .level
                .map(|l| l.to_string())
                .unwrap_or_else(|| "Unassigned".to_string()),
            GroupBy::Grade => format!("Grade {}", jr.record.grade),
            GroupBy::Course => jr.record.course.to_string(),
        };
        let entry = groups.entry(key).or_default();
        entry.0.insert(jr.record.student_id.as_str());
        entry.1.push(jr.record.rit_score as f64);
    }

    groups
        .into_iter()
        .map(|(group, (students, scores))| GroupAverage {
            group,
            students: students.len(),
            records: scores.len(),
            average: mean(&scores).map(round1),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Level x term series
// ---------------------------------------------------------------------------

/// One point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub term: TermKey,
    pub average: f64,
    pub count: usize,
}

/// Average RIT over time for one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTermSeries {
    pub level: LevelFilter,
    pub points: Vec<SeriesPoint>,
}

/// Per-level series of average RIT by term, in chronological order.
pub fn level_term_series(records: &[JoinedRecord], course: Course) -> Vec<LevelTermSeries> {
    LevelFilter::ALL
        .iter()
        .map(|&level| {
            let mut by_term: BTreeMap<TermKey, Vec<f64>> = BTreeMap::new();
            for jr in records
                .iter()
                .filter(|jr| jr.record.course == course && level.matches(jr.student.level))
            {
                by_term
                    .entry(jr.record.term)
                    .or_default()
                    .push(jr.record.rit_score as f64);
            }
            let points = by_term
                .into_iter()
                .filter_map(|(term, scores)| {
                    Some(SeriesPoint {
                        term,
                        average: round1(mean(&scores)?),
                        count: scores.len(),
                    })
                })
                .collect();
            LevelTermSeries { level, points }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Term-by-term overview
// ---------------------------------------------------------------------------

/// One row of the term-by-term overview table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermOverviewRow {
    pub term: TermKey,
    pub records: usize,
    pub students: usize,
    pub reading_average: Option<f64>,
    pub language_average: Option<f64>,
    pub combined_average: Option<f64>,
    pub reading_norm: Option<f64>,
    pub language_norm: Option<f64>,
}

/// Term-by-term averages for one grade, with the national norm alongside.
pub fn term_overview(records: &[JoinedRecord], grade: u8, norms: &NormTable) -> Vec<TermOverviewRow> {
    let mut by_term: BTreeMap<TermKey, Vec<&JoinedRecord>> = BTreeMap::new();
    for jr in records.iter().filter(|jr| jr.record.grade == grade) {
        by_term.entry(jr.record.term).or_default().push(jr);
    }

    by_term
        .into_iter()
        .map(|(term, rows)| {
            let scores = |course: Option<Course>| -> Vec<f64> {
                rows.iter()
                    .filter(|jr| course.map_or(true, |c| jr.record.course == c))
                    .map(|jr| jr.record.rit_score as f64)
                    .collect()
            };
            let students: BTreeSet<&str> =
                rows.iter().map(|jr| jr.record.student_id.as_str()).collect();

            TermOverviewRow {
                term,
                records: rows.len(),
                students: students.len(),
                reading_average: mean(&scores(Some(Course::Reading))).map(round1),
                language_average: mean(&scores(Some(Course::LanguageUsage))).map(round1),
                combined_average: mean(&scores(None)).map(round1),
                reading_norm: norms.expected_rit(term, grade, Course::Reading),
                language_norm: norms.expected_rit(term, grade, Course::LanguageUsage),
            }
        })
        .collect()
}
