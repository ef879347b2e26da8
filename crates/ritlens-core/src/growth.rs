//! Growth and national-norm comparisons.
//!
//! Two growth horizons are tracked independently: within-year (Fall→Spring)
//! and year-over-year (Fall→Fall). Schoolwide growth is compared to the
//! static norm table through [`growth_index`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Course, GrowthBlock, JoinedRecord, NormReference};
use crate::statistics::{latest_by_student, mean, round1, round2};
use crate::term::{Season, TermKey};

/// National norms keyed by (academic-year start, grade, season, course).
#[derive(Debug, Clone, Default)]
pub struct NormTable {
    rows: HashMap<(u16, u8, Season, Course), NormReference>,
}

impl NormTable {
    /// Build a table; a later row for the same key replaces an earlier one.
    pub fn from_rows(rows: impl IntoIterator<Item = NormReference>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| ((r.term.year_start, r.grade, r.term.season, r.course), r))
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, term: TermKey, grade: u8, course: Course) -> Option<&NormReference> {
        self.rows.get(&(term.year_start, grade, term.season, course))
    }

    /// Expected RIT for students of `grade` testing in `term`.
    pub fn expected_rit(&self, term: TermKey, grade: u8, course: Course) -> Option<f64> {
        self.get(term, grade, course).map(|r| r.expected_rit)
    }

    /// Expected Fall→Spring growth for an academic year, read from that
    /// year's Spring row.
    pub fn expected_growth(&self, year_start: u16, grade: u8, course: Course) -> Option<f64> {
        self.get(TermKey::new(Season::Spring, year_start), grade, course)
            .and_then(|r| r.expected_growth)
    }
}

/// `actual / expected`, or `None` when `expected` is zero or either side is
/// not finite. Never infinite or NaN.
pub fn growth_index(actual: f64, expected: f64) -> Option<f64> {
    if expected == 0.0 || !expected.is_finite() || !actual.is_finite() {
        return None;
    }
    Some(actual / expected)
}

/// Summary of one growth horizon across a population.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonSummary {
    /// Students with a growth block for this horizon.
    pub students: usize,
    pub met_projected: usize,
    /// Share of students with a met/not-met flag who met projected growth.
    pub met_projected_pct: Option<f64>,
    pub mean_projected_growth: Option<f64>,
    pub mean_observed_growth: Option<f64>,
    pub mean_conditional_growth_index: Option<f64>,
    pub mean_conditional_growth_percentile: Option<f64>,
    pub quintiles: BTreeMap<String, usize>,
}

impl HorizonSummary {
    fn from_blocks<'a>(blocks: impl Iterator<Item = &'a GrowthBlock>) -> Self {
        let blocks: Vec<&GrowthBlock> = blocks.collect();
        let collect = |f: fn(&GrowthBlock) -> Option<f64>| -> Vec<f64> {
            blocks.iter().filter_map(|b| f(b)).collect()
        };

        let flags: Vec<bool> = blocks.iter().filter_map(|b| b.met_projected_growth).collect();
        let met = flags.iter().filter(|m| **m).count();
        let mut quintiles = BTreeMap::new();
        for q in blocks.iter().filter_map(|b| b.growth_quintile.as_ref()) {
            *quintiles.entry(q.clone()).or_default() += 1;
        }

        Self {
            students: blocks.len(),
            met_projected: met,
            met_projected_pct: (!flags.is_empty())
                .then(|| round1(met as f64 * 100.0 / flags.len() as f64)),
            mean_projected_growth: mean(&collect(|b| b.projected_growth)).map(round1),
            mean_observed_growth: mean(&collect(|b| b.observed_growth)).map(round1),
            mean_conditional_growth_index: mean(&collect(|b| b.conditional_growth_index))
                .map(round2),
            mean_conditional_growth_percentile: mean(&collect(|b| {
                b.conditional_growth_percentile
            }))
            .map(round1),
            quintiles,
        }
    }
}

/// Schoolwide growth for one academic year, grade and course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthAnalysis {
    pub academic_year: String,
    pub grade: u8,
    pub course: Course,
    /// Students with both a Fall and a Spring score.
    pub matched_students: usize,
    /// Students with only one of the two terms; excluded from growth.
    pub unmatched_students: usize,
    pub fall_average: Option<f64>,
    pub spring_average: Option<f64>,
    pub actual_growth: Option<f64>,
    pub expected_growth: Option<f64>,
    pub growth_index: Option<f64>,
    pub fall_to_spring: HorizonSummary,
    pub fall_to_fall: HorizonSummary,
}

/// Compare Fall→Spring growth of matched students against the norm.
///
/// The Fall→Fall summary reads blocks from the next year's Fall records,
/// where the export reports them (grade + 1).
pub fn analyze_growth(
    records: &[JoinedRecord],
    year_start: u16,
    grade: u8,
    course: Course,
    norms: &NormTable,
) -> GrowthAnalysis {
    let fall = TermKey::new(Season::Fall, year_start);
    let spring = TermKey::new(Season::Spring, year_start);
    let next_fall = fall.next_year();

    let in_term = |term: TermKey, grade: u8| {
        latest_by_student(records.iter().filter(move |jr| {
            jr.record.term == term && jr.record.course == course && jr.record.grade == grade
        }))
    };
    let fall_scores = in_term(fall, grade);
    let spring_scores = in_term(spring, grade);

    let mut fall_matched = Vec::new();
    let mut spring_matched = Vec::new();
    for (student, f) in &fall_scores {
        if let Some(s) = spring_scores.get(student) {
            fall_matched.push(f.record.rit_score as f64);
            spring_matched.push(s.record.rit_score as f64);
        }
    }
    let matched = fall_matched.len();
    let unmatched = fall_scores.len() + spring_scores.len() - 2 * matched;

    let fall_average = mean(&fall_matched);
    let spring_average = mean(&spring_matched);
    let actual_growth = fall_average.zip(spring_average).map(|(f, s)| s - f);
    let expected_growth = norms.expected_growth(year_start, grade, course);
    let index = actual_growth
        .zip(expected_growth)
        .and_then(|(a, e)| growth_index(a, e));

    if expected_growth.is_none() {
        tracing::debug!(year_start, grade, %course, "no expected growth in norm table");
    }

    let fall_to_spring = HorizonSummary::from_blocks(
        spring_scores
            .values()
            .filter_map(|jr| jr.record.fall_to_spring.as_ref()),
    );
    let fall_to_fall = HorizonSummary::from_blocks(
        in_term(next_fall, grade.saturating_add(1))
            .values()
            .filter_map(|jr| jr.record.fall_to_fall.as_ref()),
    );

    GrowthAnalysis {
        academic_year: fall.academic_year(),
        grade,
        course,
        matched_students: matched,
        unmatched_students: unmatched,
        fall_average: fall_average.map(round1),
        spring_average: spring_average.map(round1),
        actual_growth: actual_growth.map(round2),
        expected_growth,
        growth_index: index.map(round2),
        fall_to_spring,
        fall_to_fall,
    }
}

/// School average against the national norm for one term.
///
/// The norm fields are `None` when the norm table has no row for the slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormComparison {
    pub term: TermKey,
    pub grade: u8,
    pub course: Course,
    pub students: usize,
    pub school_average: f64,
    pub national_norm: Option<f64>,
    pub difference: Option<f64>,
    pub is_above_norm: Option<bool>,
}

impl NormComparison {
    pub fn has_norm(&self) -> bool {
        self.national_norm.is_some()
    }
}

/// `None` only when no records match the slice.
pub fn compare_to_norm(
    records: &[JoinedRecord],
    term: TermKey,
    grade: u8,
    course: Course,
    norms: &NormTable,
) -> Option<NormComparison> {
    let latest = latest_by_student(records.iter().filter(|jr| {
        jr.record.term == term && jr.record.grade == grade && jr.record.course == course
    }));
    let scores: Vec<f64> = latest.values().map(|jr| jr.record.rit_score as f64).collect();
    let school_average = mean(&scores)?;
    let national_norm = norms.expected_rit(term, grade, course);

    Some(NormComparison {
        term,
        grade,
        course,
        students: scores.len(),
        school_average: round1(school_average),
        national_norm,
        difference: national_norm.map(|n| round1(school_average - n)),
        is_above_norm: national_norm.map(|n| school_average >= n),
    })
}
