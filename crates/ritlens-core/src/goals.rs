//! Per-skill-goal performance.
//!
//! Each course reports a fixed catalog of goals. Export goal columns are
//! matched to the catalog by normalized name prefix, and a goal's score is the
//! midpoint of its RIT range. Goals with a missing or malformed range are
//! excluded, whatever RIT estimate the export carries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Course, GoalScore, JoinedRecord, LevelFilter};
use crate::statistics::{latest_by_student, mean, round1};
use crate::term::TermKey;

const READING_GOALS: &[&str] = &[
    "Literary Text: Language, Craft, and Structure",
    "Literary Text: Key Ideas and Details",
    "Informational Text: Language, Craft, and Structure",
    "Informational Text: Key Ideas and Details",
    "Vocabulary: Acquisition and Use",
];

const LANGUAGE_GOALS: &[&str] = &[
    "Grammar and Usage",
    "Mechanics",
    "Writing: Write, Revise Texts for Purpose and Audience",
];

/// Goal names reported for `course`, in display order.
pub fn catalog(course: Course) -> &'static [&'static str] {
    match course {
        Course::Reading => READING_GOALS,
        Course::LanguageUsage => LANGUAGE_GOALS,
    }
}

/// Midpoint of a `"low-high"` RIT range.
///
/// `None` for empty, malformed or reversed ranges.
pub fn parse_rit_range(raw: &str) -> Option<f64> {
    let (low, high) = raw.trim().split_once('-')?;
    let low: f64 = low.trim().parse().ok()?;
    let high: f64 = high.trim().parse().ok()?;
    if !low.is_finite() || !high.is_finite() || low > high {
        return None;
    }
    Some((low + high) / 2.0)
}

fn normalize(name: &str) -> String {
    name.to_lowercase()
        .replace('&', "and")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Catalog entry an export goal name belongs to, if any.
pub fn match_goal(course: Course, name: &str) -> Option<&'static str> {
    let name = normalize(name);
    if name.is_empty() {
        return None;
    }
    catalog(course)
        .iter()
        .copied()
        .find(|entry| name.starts_with(&normalize(entry)))
}

fn goal_value(goal: &GoalScore) -> Option<f64> {
    goal.range.as_deref().and_then(parse_rit_range)
}

/// Average score on one goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStat {
    pub goal: String,
    pub average: Option<f64>,
    pub students: usize,
    /// Students in the population with no usable score for this goal.
    pub excluded: usize,
    /// `average - overall_average`; only set on the `All` level.
    pub vs_overall: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelGoals {
    pub level: LevelFilter,
    pub students: usize,
    pub goals: Vec<GoalStat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalPerformance {
    pub term: TermKey,
    pub grade: u8,
    pub course: Course,
    pub students: usize,
    /// Mean overall RIT for the population.
    pub overall_average: Option<f64>,
    /// Students with no level; counted only under `All`.
    pub unleveled: usize,
    pub levels: Vec<LevelGoals>,
}

/// Goal averages per level for one term, grade and course.
pub fn goal_performance(
    records: &[JoinedRecord],
    term: TermKey,
    grade: u8,
    course: Course,
) -> GoalPerformance {
    let population: Vec<&JoinedRecord> = latest_by_student(records.iter().filter(|jr| {
        jr.record.term == term && jr.record.grade == grade && jr.record.course == course
    }))
    .into_values()
    .collect();

    // student -> catalog goal -> score
    let scores: Vec<BTreeMap<&'static str, f64>> = population
        .iter()
        .map(|jr| {
            let mut by_goal = BTreeMap::new();
            for goal in &jr.record.goals {
                if let (Some(entry), Some(value)) = (match_goal(course, &goal.name), goal_value(goal)) {
                    by_goal.entry(entry).or_insert(value);
                }
            }
            by_goal
        })
        .collect();

    let overall: Vec<f64> = population.iter().map(|jr| jr.record.rit_score as f64).collect();
    let overall_average = mean(&overall).map(round1);

    let levels = LevelFilter::ALL
        .iter()
        .map(|&level| {
            let members: Vec<usize> = population
                .iter()
                .enumerate()
                .filter(|(_, jr)| level.matches(jr.student.level))
                .map(|(i, _)| i)
                .collect();

            let goals = catalog(course)
                .iter()
                .map(|&goal| {
                    let values: Vec<f64> = members
                        .iter()
                        .filter_map(|&i| scores[i].get(goal).copied())
                        .collect();
                    let average = mean(&values).map(round1);
                    let vs_overall = match level {
                        LevelFilter::All => average
                            .zip(overall_average)
                            .map(|(a, o)| round1(a - o)),
                        LevelFilter::Level(_) => None,
                    };
                    GoalStat {
                        goal: goal.to_string(),
                        average,
                        students: values.len(),
                        excluded: members.len() - values.len(),
                        vs_overall,
                    }
                })
                .collect();

            LevelGoals {
                level,
                students: members.len(),
                goals,
            }
        })
        .collect();

    GoalPerformance {
        term,
        grade,
        course,
        students: population.len(),
        overall_average,
        unleveled: population.iter().filter(|jr| jr.student.level.is_none()).count(),
        levels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProficiencyLevel;
    use crate::testutil::joined;

    fn goal(index: u8, name: &str, rit: Option<f64>, range: Option<&str>) -> GoalScore {
        GoalScore {
            index,
            name: name.to_string(),
            rit_score: rit,
            std_err: None,
            range: range.map(str::to_string),
            adjective: None,
        }
    }

    #[test]
    fn rit_range_midpoint() {
        assert_eq!(parse_rit_range("191-201"), Some(196.0));
        assert_eq!(parse_rit_range(" 200 - 210 "), Some(205.0));
        assert_eq!(parse_rit_range("201-191"), None);
        assert_eq!(parse_rit_range("abc"), None);
        assert_eq!(parse_rit_range(""), None);
        assert_eq!(parse_rit_range("190-"), None);
    }

    #[test]
    fn goal_names_match_by_prefix() {
        assert_eq!(
            match_goal(Course::Reading, "Vocabulary: Acquisition and Use"),
            Some("Vocabulary: Acquisition and Use")
        );
        assert_eq!(
            match_goal(Course::Reading, "literary text:  key ideas & details"),
            Some("Literary Text: Key Ideas and Details")
        );
        assert_eq!(
            match_goal(Course::LanguageUsage, "Mechanics (Capitalization, Punctuation)"),
            Some("Mechanics")
        );
        assert_eq!(match_goal(Course::LanguageUsage, "Vocabulary: Acquisition and Use"), None);
        assert_eq!(match_goal(Course::Reading, ""), None);
    }

    #[test]
    fn per_level_goal_averages() {
        let term = "Fall 2024-2025";
        let mut a = joined("20190001", 4, Course::LanguageUsage, term, 200, Some(ProficiencyLevel::E1));
        a.record.goals = vec![
            goal(1, "Grammar and Usage", Some(203.0), Some("200-208")),
            goal(2, "Mechanics", None, Some("191-201")),
        ];
        let mut b = joined("20190002", 4, Course::LanguageUsage, term, 190, Some(ProficiencyLevel::E2));
        b.record.goals = vec![goal(1, "Grammar and Usage", None, Some("186-194"))];
        let mut c = joined("20190003", 4, Course::LanguageUsage, term, 180, None);
        c.record.goals = vec![goal(1, "Grammar and Usage", None, Some("170-180"))];

        let perf = goal_performance(&[a, b, c], term.parse().unwrap(), 4, Course::LanguageUsage);
        assert_eq!(perf.students, 3);
        assert_eq!(perf.unleveled, 1);
        assert_eq!(perf.overall_average, Some(190.0));

        let all = perf.levels.iter().find(|l| l.level == LevelFilter::All).unwrap();
        assert_eq!(all.students, 3);
        let grammar = &all.goals[0];
        assert_eq!(grammar.goal, "Grammar and Usage");
        // (204 + 190 + 175) / 3
        assert_eq!(grammar.average, Some(189.7));
        assert_eq!(grammar.vs_overall, Some(-0.3));
        let mechanics = &all.goals[1];
        assert_eq!(mechanics.average, Some(196.0));
        assert_eq!(mechanics.excluded, 2);

        let e1 = perf
            .levels
            .iter()
            .find(|l| l.level == LevelFilter::Level(ProficiencyLevel::E1))
            .unwrap();
        assert_eq!(e1.students, 1);
        assert_eq!(e1.goals[0].average, Some(204.0));
        assert_eq!(e1.goals[0].vs_overall, None);
    }

    #[test]
    fn range_midpoint_wins_over_estimate() {
        let term = "Fall 2024-2025";
        let mut a = joined("20190001", 4, Course::LanguageUsage, term, 200, None);
        a.record.goals = vec![
            goal(1, "Grammar and Usage", Some(210.0), Some("garbage")),
            goal(2, "Mechanics", Some(250.0), Some("191-201")),
        ];
        let mut b = joined("20190002", 4, Course::LanguageUsage, term, 200, None);
        b.record.goals = vec![goal(1, "Grammar and Usage", Some(220.0), None)];

        let perf = goal_performance(&[a, b], term.parse().unwrap(), 4, Course::LanguageUsage);
        let all = perf.levels.iter().find(|l| l.level == LevelFilter::All).unwrap();

        let grammar = &all.goals[0];
        assert_eq!(grammar.average, None);
        assert_eq!(grammar.students, 0);
        assert_eq!(grammar.excluded, 2);

        let mechanics = &all.goals[1];
        assert_eq!(mechanics.average, Some(196.0));
        assert_eq!(mechanics.students, 1);
        assert_eq!(mechanics.excluded, 1);
    }

    #[test]
    fn empty_population() {
        let perf = goal_performance(&[], "Fall 2024-2025".parse().unwrap(), 4, Course::Reading);
        assert_eq!(perf.students, 0);
        assert_eq!(perf.overall_average, None);
        assert_eq!(perf.levels.len(), 4);
        assert!(perf.levels[0].goals.iter().all(|g| g.average.is_none()));
    }
}
