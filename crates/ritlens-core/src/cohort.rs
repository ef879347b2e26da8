//! Entry-year cohorts followed across terms.
//!
//! Student ids carry a school-entry-year prefix (`2019…`), so a cohort is the
//! set of active students sharing that prefix. Terms are ordered with
//! [`TermKey`]'s chronological ordering, never by arrival order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::growth::NormTable;
use crate::model::{Course, JoinedRecord};
use crate::statistics::{mean, round1};
use crate::term::TermKey;

/// Cohort averages for one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortTermPoint {
    pub term: TermKey,
    pub students: usize,
    pub reading_average: Option<f64>,
    pub language_average: Option<f64>,
    /// Mean of every RIT score in the term, both courses.
    pub combined_average: Option<f64>,
    /// Mean expected RIT for the same records.
    pub norm_average: Option<f64>,
    /// Records with no matching norm row.
    pub unmatched_norms: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortTrajectory {
    pub prefix: String,
    pub students: usize,
    pub points: Vec<CohortTermPoint>,
    /// Combined average of the last term minus the first.
    pub total_growth: Option<f64>,
    /// `total_growth` minus the norm's movement over the same span.
    pub vs_norm: Option<f64>,
}

/// Follow the active students whose id starts with `prefix`.
pub fn track_cohort(records: &[JoinedRecord], prefix: &str, norms: &NormTable) -> CohortTrajectory {
    let members: Vec<&JoinedRecord> = records
        .iter()
        .filter(|jr| jr.student.active && jr.record.student_id.starts_with(prefix))
        .collect();

    let mut by_term: BTreeMap<TermKey, Vec<&JoinedRecord>> = BTreeMap::new();
    for jr in &members {
        by_term.entry(jr.record.term).or_default().push(jr);
    }

    let points: Vec<CohortTermPoint> = by_term
        .into_iter()
        .map(|(term, rows)| term_point(term, &rows, norms))
        .collect();

    let (total_growth, vs_norm) = match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => {
            let growth = last
                .combined_average
                .zip(first.combined_average)
                .map(|(l, f)| round1(l - f));
            let norm_growth = last.norm_average.zip(first.norm_average).map(|(l, f)| l - f);
            let vs = growth.zip(norm_growth).map(|(g, n)| round1(g - n));
            (growth, vs)
        }
        _ => (None, None),
    };

    let students = members
        .iter()
        .map(|jr| jr.record.student_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();
    tracing::debug!(prefix, students, terms = points.len(), "cohort tracked");

    CohortTrajectory {
        prefix: prefix.to_string(),
        students,
        points,
        total_growth,
        vs_norm,
    }
}

fn term_point(term: TermKey, rows: &[&JoinedRecord], norms: &NormTable) -> CohortTermPoint {
    let scores = |course: Option<Course>| -> Vec<f64> {
        rows.iter()
            .filter(|jr| course.map_or(true, |c| jr.record.course == c))
            .map(|jr| jr.record.rit_score as f64)
            .collect()
    };

    let mut expected = Vec::new();
    let mut unmatched_norms = 0;
    for jr in rows {
        match norms.expected_rit(term, jr.record.grade, jr.record.course) {
            Some(rit) => expected.push(rit),
            None => unmatched_norms += 1,
        }
    }

    CohortTermPoint {
        term,
        students: rows
            .iter()
            .map(|jr| jr.record.student_id.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        reading_average: mean(&scores(Some(Course::Reading))).map(round1),
        language_average: mean(&scores(Some(Course::LanguageUsage))).map(round1),
        combined_average: mean(&scores(None)).map(round1),
        norm_average: mean(&expected).map(round1),
        unmatched_norms,
    }
}
