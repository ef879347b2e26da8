//! Composite benchmark tiers.
//!
//! A student's composite is the mean of their Reading and Language Usage RIT
//! in the same term. Students missing either score are excluded and counted,
//! never assigned a default tier.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BenchmarkThreshold, BenchmarkTier, Course, JoinedRecord, ProficiencyLevel};
use crate::statistics::{latest_by_student, percentages};
use crate::term::TermKey;

/// A threshold row that cannot produce monotonic tiers.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("grade {grade}: e1_min ({e1_min}) must be greater than e2_min ({e2_min})")]
pub struct ThresholdError {
    pub grade: u8,
    pub e1_min: f64,
    pub e2_min: f64,
}

/// Cutoffs for every configured grade.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkThresholds {
    by_grade: BTreeMap<u8, BenchmarkThreshold>,
}

impl Default for BenchmarkThresholds {
    fn default() -> Self {
        const DEFAULTS: [(u8, f64, f64); 9] = [
            (0, 165.0, 150.0),
            (1, 180.0, 165.0),
            (2, 192.0, 176.0),
            (3, 203.0, 188.0),
            (4, 210.0, 196.0),
            (5, 216.0, 202.0),
            (6, 220.0, 207.0),
            (7, 224.0, 211.0),
            (8, 227.0, 214.0),
        ];
        Self {
            by_grade: DEFAULTS
                .iter()
                .map(|&(grade, e1_min, e2_min)| {
                    (
                        grade,
                        BenchmarkThreshold {
                            grade,
                            e1_min,
                            e2_min,
                        },
                    )
                })
                .collect(),
        }
    }
}

impl BenchmarkThresholds {
    /// A table holding exactly `rows`.
    pub fn new(rows: impl IntoIterator<Item = BenchmarkThreshold>) -> Result<Self, ThresholdError> {
        let mut table = Self {
            by_grade: BTreeMap::new(),
        };
        for row in rows {
            table.set(row)?;
        }
        Ok(table)
    }

    /// Add or replace the cutoffs for one grade.
    pub fn set(&mut self, row: BenchmarkThreshold) -> Result<(), ThresholdError> {
        if !(row.e1_min > row.e2_min) {
            return Err(ThresholdError {
                grade: row.grade,
                e1_min: row.e1_min,
                e2_min: row.e2_min,
            });
        }
        self.by_grade.insert(row.grade, row);
        Ok(())
    }

    pub fn get(&self, grade: u8) -> Option<&BenchmarkThreshold> {
        self.by_grade.get(&grade)
    }

    pub fn grades(&self) -> impl Iterator<Item = u8> + '_ {
        self.by_grade.keys().copied()
    }

    /// Tier for a composite average. `None` only when the grade has no
    /// cutoffs configured.
    pub fn classify(&self, grade: u8, composite: f64) -> Option<BenchmarkTier> {
        let t = self.get(grade)?;
        Some(if composite >= t.e1_min {
            BenchmarkTier::E1
        } else if composite >= t.e2_min {
            BenchmarkTier::E2
        } else {
            BenchmarkTier::E3
        })
    }
}

/// Paired Reading / Language Usage scores for one student in one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub student_id: String,
    pub grade: u8,
    pub level: Option<ProficiencyLevel>,
    pub reading: u16,
    pub language_usage: u16,
    pub composite: f64,
}

/// Composites for a term plus how many students lacked a pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeSet {
    pub scores: BTreeMap<String, CompositeScore>,
    /// Students with only one of the two course scores.
    pub missing_pair: usize,
}

/// Pair each student's latest Reading and Language Usage score in `term`.
pub fn composite_scores(records: &[JoinedRecord], term: TermKey) -> CompositeSet {
    let course_scores = |course: Course| {
        latest_by_student(
            records
                .iter()
                .filter(move |jr| jr.record.term == term && jr.record.course == course),
        )
    };
    let reading = course_scores(Course::Reading);
    let language = course_scores(Course::LanguageUsage);

    let mut set = CompositeSet::default();
    for (student, r) in &reading {
        match language.get(student) {
            Some(l) => {
                let composite = (r.record.rit_score as f64 + l.record.rit_score as f64) / 2.0;
                set.scores.insert(
                    student.to_string(),
                    CompositeScore {
                        student_id: student.to_string(),
                        grade: r.record.grade,
                        level: r.student.level,
                        reading: r.record.rit_score,
                        language_usage: l.record.rit_score,
                        composite,
                    },
                );
            }
            None => set.missing_pair += 1,
        }
    }
    set.missing_pair += language.keys().filter(|s| !reading.contains_key(*s)).count();
    set
}

/// Count and share of one tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierCount {
    pub count: usize,
    pub percentage: f64,
}

/// Tier distribution over students with both course scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkDistribution {
    pub term: TermKey,
    pub grade: Option<u8>,
    pub e1: TierCount,
    pub e2: TierCount,
    pub e3: TierCount,
    /// Students classified (the denominator of the percentages).
    pub classified: usize,
    /// Students excluded for lacking one of the course scores.
    pub missing_pair: usize,
    /// Students excluded because their grade has no cutoffs.
    pub missing_threshold: usize,
}

impl BenchmarkDistribution {
    pub fn tier(&self, tier: BenchmarkTier) -> TierCount {
        match tier {
            BenchmarkTier::E1 => self.e1,
            BenchmarkTier::E2 => self.e2,
            BenchmarkTier::E3 => self.e3,
        }
    }
}

/// Classify every paired student in `term` (optionally one grade).
pub fn benchmark_distribution(
    records: &[JoinedRecord],
    term: TermKey,
    grade: Option<u8>,
    thresholds: &BenchmarkThresholds,
) -> BenchmarkDistribution {
    let scoped: Vec<JoinedRecord>;
    let records = match grade {
        Some(g) => {
            scoped = records
                .iter()
                .filter(|jr| jr.record.grade == g)
                .cloned()
                .collect();
            &scoped[..]
        }
        None => records,
    };
    let set = composite_scores(records, term);

    let mut counts = [0usize; 3];
    let mut missing_threshold = 0;
    for score in set.scores.values() {
        match thresholds.classify(score.grade, score.composite) {
            Some(tier) => counts[tier.index()] += 1,
            None => missing_threshold += 1,
        }
    }

    let pct = percentages(&counts);
    let tier = |i: usize| TierCount {
        count: counts[i],
        percentage: pct[i],
    };

    if set.missing_pair > 0 || missing_threshold > 0 {
        tracing::debug!(
            %term,
            missing_pair = set.missing_pair,
            missing_threshold,
            "students excluded from benchmark classification"
        );
    }

    BenchmarkDistribution {
        term,
        grade,
        e1: tier(0),
        e2: tier(1),
        e3: tier(2),
        classified: counts.iter().sum(),
        missing_pair: set.missing_pair,
        missing_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{joined, pair};

    #[test]
    fn classify_respects_cutoffs() {
        let t = BenchmarkThresholds::default();
        assert_eq!(t.classify(4, 210.0), Some(BenchmarkTier::E1));
        assert_eq!(t.classify(4, 209.5), Some(BenchmarkTier::E2));
        assert_eq!(t.classify(4, 196.0), Some(BenchmarkTier::E2));
        assert_eq!(t.classify(4, 195.9), Some(BenchmarkTier::E3));
        assert_eq!(t.classify(12, 250.0), None);
    }

    #[test]
    fn classify_is_total_and_monotonic_over_rit_range() {
        let t = BenchmarkThresholds::default();
        for grade in t.grades().collect::<Vec<_>>() {
            let mut previous = BenchmarkTier::E3.rank();
            for tenth in 1000..=4000 {
                let avg = tenth as f64 / 10.0;
                let tier = t.classify(grade, avg).expect("configured grade");
                assert_eq!(t.classify(grade, avg), Some(tier));
                assert!(tier.rank() >= previous);
                previous = tier.rank();
            }
        }
    }

    #[test]
    fn rejects_non_monotonic_thresholds() {
        let err = BenchmarkThresholds::new(vec![BenchmarkThreshold {
            grade: 4,
            e1_min: 190.0,
            e2_min: 200.0,
        }])
        .unwrap_err();
        assert_eq!(err.grade, 4);
    }

    #[test]
    fn composite_requires_both_courses() {
        let term: TermKey = "Fall 2024-2025".parse().unwrap();
        let mut records = pair("20190001", 4, "Fall 2024-2025", 200, 210);
        records.push(joined("20190002", 4, Course::Reading, "Fall 2024-2025", 190, None));
        records.push(joined("20190003", 4, Course::LanguageUsage, "Fall 2024-2025", 190, None));

        let set = composite_scores(&records, term);
        assert_eq!(set.scores.len(), 1);
        assert_eq!(set.scores["20190001"].composite, 205.0);
        assert_eq!(set.missing_pair, 2);
    }

    #[test]
    fn ten_student_distribution_sums() {
        let term = "Spring 2025-2026";
        let composites = [200, 205, 212, 215, 220, 190, 185, 198, 208, 230];
        let records: Vec<JoinedRecord> = composites
            .iter()
            .enumerate()
            .flat_map(|(i, &c)| pair(&format!("2019{:04}", i), 4, term, c, c))
            .collect();

        let dist = benchmark_distribution(
            &records,
            term.parse().unwrap(),
            Some(4),
            &BenchmarkThresholds::default(),
        );
        assert_eq!(dist.e1.count + dist.e2.count + dist.e3.count, 10);
        assert_eq!(dist.classified, 10);
        let total_pct = dist.e1.percentage + dist.e2.percentage + dist.e3.percentage;
        assert!((total_pct - 100.0).abs() <= 0.1);
        assert_eq!(dist.e1.count, 4);
        assert_eq!(dist.e2.count, 4);
        assert_eq!(dist.e3.count, 2);
        assert_eq!(dist.e1.percentage, 40.0);
        assert_eq!(dist.e3.percentage, 20.0);
    }

    #[test]
    fn exclusions_are_counted() {
        let term = "Fall 2024-2025";
        let mut records = pair("20190001", 4, term, 200, 200);
        records.extend(pair("20190002", 11, term, 230, 230));
        records.push(joined("20190003", 4, Course::Reading, term, 200, None));

        let dist = benchmark_distribution(
            &records,
            term.parse().unwrap(),
            None,
            &BenchmarkThresholds::default(),
        );
        assert_eq!(dist.classified, 1);
        assert_eq!(dist.missing_pair, 1);
        assert_eq!(dist.missing_threshold, 1);
    }

    #[test]
    fn empty_population_is_all_zero() {
        let dist = benchmark_distribution(
            &[],
            "Fall 2024-2025".parse().unwrap(),
            Some(4),
            &BenchmarkThresholds::default(),
        );
        assert_eq!(dist.classified, 0);
        assert_eq!(dist.e1.percentage, 0.0);
    }
}
