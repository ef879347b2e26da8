//! Term-to-term benchmark tier migration.
//!
//! Improved/declined is anchored to [`BenchmarkTier::rank`]: E1 is the
//! highest composite tier and E3 the lowest.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::classifier::{composite_scores, BenchmarkThresholds};
use crate::model::{BenchmarkTier, JoinedRecord};
use crate::term::TermKey;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkTransitionMatrix {
    pub grade: u8,
    pub from: TermKey,
    pub to: TermKey,
    /// `cells[from][to]`, both indexed E1, E2, E3.
    pub cells: [[usize; 3]; 3],
    pub improved: usize,
    pub same: usize,
    pub declined: usize,
    /// Students classified at both terms.
    pub students: usize,
    /// Grade students with no classification at the from-term.
    pub excluded_from: usize,
    /// Students classified at the from-term but not at the to-term.
    pub excluded_to: usize,
}

impl BenchmarkTransitionMatrix {
    pub fn count(&self, from: BenchmarkTier, to: BenchmarkTier) -> usize {
        self.cells[from.index()][to.index()]
    }

    pub fn total(&self) -> usize {
        self.cells.iter().flatten().sum()
    }
}

/// Tier migration for students in `grade` at the `from` term.
pub fn transition_matrix(
    records: &[JoinedRecord],
    grade: u8,
    from: TermKey,
    to: TermKey,
    thresholds: &BenchmarkThresholds,
) -> BenchmarkTransitionMatrix {
    let at_from: Vec<JoinedRecord> = records
        .iter()
        .filter(|jr| jr.record.term == from && jr.record.grade == grade)
        .cloned()
        .collect();
    let from_set = composite_scores(&at_from, from);
    let to_set = composite_scores(records, to);

    let mut matrix = BenchmarkTransitionMatrix {
        grade,
        from,
        to,
        cells: [[0; 3]; 3],
        improved: 0,
        same: 0,
        declined: 0,
        students: 0,
        excluded_from: from_set.missing_pair,
        excluded_to: 0,
    };

    for (student, before) in &from_set.scores {
        let Some(from_tier) = thresholds.classify(before.grade, before.composite) else {
            matrix.excluded_from += 1;
            continue;
        };
        let to_tier = to_set
            .scores
            .get(student)
            .and_then(|after| thresholds.classify(after.grade, after.composite));
        let Some(to_tier) = to_tier else {
            matrix.excluded_to += 1;
            continue;
        };

        matrix.cells[from_tier.index()][to_tier.index()] += 1;
        matrix.students += 1;
        match to_tier.rank().cmp(&from_tier.rank()) {
            Ordering::Greater => matrix.improved += 1,
            Ordering::Equal => matrix.same += 1,
            Ordering::Less => matrix.declined += 1,
        }
    }

    tracing::debug!(
        grade,
        %from,
        %to,
        students = matrix.students,
        excluded_from = matrix.excluded_from,
        excluded_to = matrix.excluded_to,
        "transition matrix built"
    );
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Course;
    use crate::testutil::{joined, pair};

    const FALL: &str = "Fall 2024-2025";
    const SPRING: &str = "Spring 2024-2025";

    fn build(records: &[JoinedRecord]) -> BenchmarkTransitionMatrix {
        transition_matrix(
            records,
            4,
            FALL.parse().unwrap(),
            SPRING.parse().unwrap(),
            &BenchmarkThresholds::default(),
        )
    }

    #[test]
    fn improved_means_toward_e1() {
        // E3 -> E1
        let mut records = pair("20190001", 4, FALL, 190, 190);
        records.extend(pair("20190001", 4, SPRING, 212, 212));
        // E1 -> E2
        records.extend(pair("20190002", 4, FALL, 215, 215));
        records.extend(pair("20190002", 4, SPRING, 200, 200));
        // E2 -> E2
        records.extend(pair("20190003", 4, FALL, 200, 200));
        records.extend(pair("20190003", 4, SPRING, 205, 205));

        let m = build(&records);
        assert_eq!(m.improved, 1);
        assert_eq!(m.declined, 1);
        assert_eq!(m.same, 1);
        assert_eq!(m.count(BenchmarkTier::E3, BenchmarkTier::E1), 1);
        assert_eq!(m.count(BenchmarkTier::E1, BenchmarkTier::E2), 1);
        assert_eq!(m.count(BenchmarkTier::E2, BenchmarkTier::E2), 1);
    }

    #[test]
    fn sums_agree_with_dually_qualified_students() {
        let mut records = Vec::new();
        for i in 0..12u16 {
            let id = format!("2019{:04}", i);
            records.extend(pair(&id, 4, FALL, 185 + i * 3, 190 + i * 2));
            if i % 4 != 0 {
                records.extend(pair(&id, 4, SPRING, 190 + i * 3, 188 + i * 3));
            }
        }
        // one course only at the from-term
        records.push(joined("20199999", 4, Course::Reading, FALL, 200, None));

        let m = build(&records);
        assert_eq!(m.students, 9);
        assert_eq!(m.total(), m.students);
        assert_eq!(m.improved + m.same + m.declined, m.students);
        assert_eq!(m.excluded_to, 3);
        assert_eq!(m.excluded_from, 1);
    }

    #[test]
    fn grade_filter_uses_from_term_grade() {
        // grade 4 in fall, grade 5 in the following fall
        let mut records = pair("20190001", 4, FALL, 200, 200);
        records.extend(pair("20190001", 5, "Fall 2025-2026", 220, 220));
        records.extend(pair("20190002", 5, FALL, 220, 220));
        records.extend(pair("20190002", 6, "Fall 2025-2026", 225, 225));

        let m = transition_matrix(
            &records,
            4,
            FALL.parse().unwrap(),
            "Fall 2025-2026".parse().unwrap(),
            &BenchmarkThresholds::default(),
        );
        assert_eq!(m.students, 1);
        // grade 5 E1 cutoff is 216
        assert_eq!(m.count(BenchmarkTier::E2, BenchmarkTier::E1), 1);
    }
}
