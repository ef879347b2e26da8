//! Rapid-guessing data-quality flags.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{Course, JoinedRecord};
use crate::statistics::percentages;
use crate::term::TermKey;

/// Rapid-guessing share at or below which a test is considered normal.
pub const NORMAL_MAX: f64 = 15.0;

/// Default share above which a test is flagged for review.
pub const DEFAULT_FLAG_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityBucket {
    Normal,
    Caution,
    Flagged,
}

/// Bucket for a rapid-guessing percentage. `threshold` is clamped up to
/// [`NORMAL_MAX`].
pub fn bucket(rapid_guessing_percent: f64, threshold: f64) -> QualityBucket {
    let threshold = threshold.max(NORMAL_MAX);
    if rapid_guessing_percent <= NORMAL_MAX {
        QualityBucket::Normal
    } else if rapid_guessing_percent <= threshold {
        QualityBucket::Caution
    } else {
        QualityBucket::Flagged
    }
}

/// A test held for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedTest {
    pub student_id: String,
    pub name: Option<String>,
    pub course: Course,
    pub term: TermKey,
    pub rit_score: u16,
    pub rapid_guessing_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestQualityReport {
    pub threshold: f64,
    /// Tests with a rapid-guessing value.
    pub total: usize,
    pub normal: usize,
    pub caution: usize,
    pub flagged: usize,
    pub normal_pct: f64,
    pub caution_pct: f64,
    pub flagged_pct: f64,
    /// Tests with no rapid-guessing value; not bucketed.
    pub missing: usize,
    /// Highest share first.
    pub flagged_tests: Vec<FlaggedTest>,
}

/// Bucket every record by its rapid-guessing percentage.
pub fn test_quality(records: &[JoinedRecord], threshold: f64) -> TestQualityReport {
    let threshold = threshold.max(NORMAL_MAX);
    let mut counts = [0usize; 3];
    let mut missing = 0;
    let mut flagged_tests = Vec::new();

    for jr in records {
        let Some(pct) = jr.record.rapid_guessing_percent else {
            missing += 1;
            continue;
        };
        let b = bucket(pct, threshold);
        counts[b as usize] += 1;
        if b == QualityBucket::Flagged {
            flagged_tests.push(FlaggedTest {
                student_id: jr.record.student_id.clone(),
                name: jr.student.name.clone(),
                course: jr.record.course,
                term: jr.record.term,
                rit_score: jr.record.rit_score,
                rapid_guessing_percent: pct,
            });
        }
    }

    flagged_tests.sort_by(|a, b| {
        b.rapid_guessing_percent
            .partial_cmp(&a.rapid_guessing_percent)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.student_id.cmp(&b.student_id))
    });

    let pct = percentages(&counts);
    TestQualityReport {
        threshold,
        total: counts.iter().sum(),
        normal: counts[0],
        caution: counts[1],
        flagged: counts[2],
        normal_pct: pct[0],
        caution_pct: pct[1],
        flagged_pct: pct[2],
        missing,
        flagged_tests,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::joined;

    fn with_rapid(id: &str, pct: Option<f64>) -> JoinedRecord {
        let mut jr = joined(id, 4, Course::Reading, "Fall 2024-2025", 200, None);
        jr.record.rapid_guessing_percent = pct;
        jr
    }

    #[test]
    fn bucket_boundaries() {
        assert_eq!(bucket(0.0, 30.0), QualityBucket::Normal);
        assert_eq!(bucket(15.0, 30.0), QualityBucket::Normal);
        assert_eq!(bucket(15.1, 30.0), QualityBucket::Caution);
        assert_eq!(bucket(30.0, 30.0), QualityBucket::Caution);
        assert_eq!(bucket(30.1, 30.0), QualityBucket::Flagged);
    }

    #[test]
    fn threshold_below_normal_is_clamped() {
        assert_eq!(bucket(12.0, 5.0), QualityBucket::Normal);
        assert_eq!(bucket(16.0, 5.0), QualityBucket::Flagged);
        assert_eq!(test_quality(&[], 5.0).threshold, NORMAL_MAX);
    }

    #[test]
    fn flagged_sorted_descending() {
        let records = vec![
            with_rapid("20190001", Some(40.0)),
            with_rapid("20190002", Some(10.0)),
            with_rapid("20190003", Some(55.0)),
            with_rapid("20190004", Some(20.0)),
            with_rapid("20190005", None),
            with_rapid("20190000", Some(40.0)),
        ];
        let report = test_quality(&records, DEFAULT_FLAG_THRESHOLD);
        assert_eq!(report.total, 5);
        assert_eq!((report.normal, report.caution, report.flagged), (1, 1, 3));
        assert_eq!(report.missing, 1);
        let ids: Vec<&str> = report.flagged_tests.iter().map(|f| f.student_id.as_str()).collect();
        assert_eq!(ids, ["20190003", "20190000", "20190001"]);
        assert_eq!(report.normal_pct + report.caution_pct + report.flagged_pct, 100.0);
    }
}
