//! Lexile statistics for Reading results.

use serde::{Deserialize, Serialize};

use crate::model::{Course, JoinedRecord};
use crate::parser::{format_lexile, LEXILE_MAX, LEXILE_MIN};
use crate::statistics::{latest_by_student, mean, median, pearson, percentages, round1, round2, stddev};
use crate::term::TermKey;

/// Width of a Lexile band above beginning-reader.
pub const BAND_WIDTH: i32 = 200;

/// Students in one Lexile band. `min`/`max` are inclusive; both are `None`
/// for the beginning-reader band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexileBand {
    pub label: String,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexileDistribution {
    pub term: TermKey,
    pub grade: Option<u8>,
    pub count: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Population standard deviation.
    pub std_dev: Option<f64>,
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub bands: Vec<LexileBand>,
    /// `(RIT, Lexile)` per student.
    pub pairs: Vec<(u16, i32)>,
    /// Pearson correlation of `pairs`.
    pub correlation: Option<f64>,
    /// Reading results in scope without a usable Lexile score. Stored
    /// values outside the accepted Lexile range count here.
    pub missing: usize,
}

/// Band index: 0 is beginning-reader (≤ 0L), then 200L-wide bands.
fn band_index(score: i32) -> usize {
    if score <= 0 {
        0
    } else {
        1 + (score / BAND_WIDTH) as usize
    }
}

fn band_bounds(index: usize) -> (Option<i32>, Option<i32>) {
    if index == 0 {
        return (None, None);
    }
    let low = (index as i32 - 1) * BAND_WIDTH;
    (Some(low), Some(low + BAND_WIDTH - 1))
}

fn band_label(index: usize) -> String {
    match band_bounds(index) {
        (Some(low), Some(high)) => format!("{}-{}", format_lexile(low), format_lexile(high)),
        _ => "BR".to_string(),
    }
}

/// Lexile distribution for one term's Reading results (optionally one grade).
pub fn lexile_distribution(records: &[JoinedRecord], term: TermKey, grade: Option<u8>) -> LexileDistribution {
    let latest = latest_by_student(records.iter().filter(|jr| {
        jr.record.term == term
            && jr.record.course == Course::Reading
            && grade.map_or(true, |g| jr.record.grade == g)
    }));

    let pairs: Vec<(u16, i32)> = latest
        .values()
        .filter_map(|jr| {
            jr.record
                .lexile_score
                .filter(|l| (LEXILE_MIN..=LEXILE_MAX).contains(l))
                .map(|l| (jr.record.rit_score, l))
        })
        .collect();
    let missing = latest.len() - pairs.len();
    let scores: Vec<f64> = pairs.iter().map(|p| p.1 as f64).collect();
    let average = mean(&scores);

    let bands = if pairs.is_empty() {
        Vec::new()
    } else {
        let top = pairs.iter().map(|p| band_index(p.1)).max().unwrap_or(0);
        let mut counts = vec![0usize; top + 1];
        for (_, lexile) in &pairs {
            counts[band_index(*lexile)] += 1;
        }
        let pct = percentages(&counts);
        counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| {
                let (min, max) = band_bounds(i);
                LexileBand {
                    label: band_label(i),
                    min,
                    max,
                    count,
                    percentage: pct[i],
                }
            })
            .collect()
    };

    let correlation_input: Vec<(f64, f64)> = pairs.iter().map(|&(r, l)| (r as f64, l as f64)).collect();

    LexileDistribution {
        term,
        grade,
        count: pairs.len(),
        mean: average.map(round1),
        median: median(&scores).map(round1),
        std_dev: average.and_then(|m| stddev(&scores, m)).map(round1),
        min: pairs.iter().map(|p| p.1).min(),
        max: pairs.iter().map(|p| p.1).max(),
        bands,
        correlation: pearson(&correlation_input).map(round2),
        pairs,
        missing,
    }
}
