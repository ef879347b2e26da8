//! Core data model types for ritlens.
//!
//! Assessment records are produced once by the parser and never mutated.
//! Everything analytic is recomputed from them on each query.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::term::{Season, TermKey};

/// Lowest RIT score the assessment reports.
pub const RIT_MIN: u16 = 100;
/// Highest RIT score the assessment reports.
pub const RIT_MAX: u16 = 400;

/// Assessed subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Course {
    Reading,
    LanguageUsage,
}

impl Course {
    pub const ALL: [Course; 2] = [Course::Reading, Course::LanguageUsage];

    /// Label as it appears in the export.
    pub fn label(self) -> &'static str {
        match self {
            Course::Reading => "Reading",
            Course::LanguageUsage => "Language Usage",
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Course {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "reading" => Ok(Course::Reading),
            "languageusage" => Ok(Course::LanguageUsage),
            _ => Err(format!("unknown course: {}", s.trim())),
        }
    }
}

/// Composite benchmark tier computed from paired RIT scores.
///
/// E1 is the highest tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BenchmarkTier {
    E1,
    E2,
    E3,
}

impl BenchmarkTier {
    /// Matrix / display order, highest first.
    pub const ALL: [BenchmarkTier; 3] = [BenchmarkTier::E1, BenchmarkTier::E2, BenchmarkTier::E3];

    /// Achievement rank: larger is better. E1 = 3, E3 = 1.
    pub fn rank(self) -> u8 {
        match self {
            BenchmarkTier::E1 => 3,
            BenchmarkTier::E2 => 2,
            BenchmarkTier::E3 => 1,
        }
    }

    /// Row/column index in a tier matrix (E1 = 0).
    pub fn index(self) -> usize {
        match self {
            BenchmarkTier::E1 => 0,
            BenchmarkTier::E2 => 1,
            BenchmarkTier::E3 => 2,
        }
    }
}

impl fmt::Display for BenchmarkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkTier::E1 => write!(f, "E1"),
            BenchmarkTier::E2 => write!(f, "E2"),
            BenchmarkTier::E3 => write!(f, "E3"),
        }
    }
}

/// Classroom proficiency grouping stored on the student roster.
///
/// Shares the E1/E2/E3 labels with [`BenchmarkTier`] but is assigned by
/// staff, not computed, and the two must not be compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProficiencyLevel {
    E1,
    E2,
    E3,
}

impl ProficiencyLevel {
    pub const ALL: [ProficiencyLevel; 3] = [
        ProficiencyLevel::E1,
        ProficiencyLevel::E2,
        ProficiencyLevel::E3,
    ];
}

impl fmt::Display for ProficiencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProficiencyLevel::E1 => write!(f, "E1"),
            ProficiencyLevel::E2 => write!(f, "E2"),
            ProficiencyLevel::E3 => write!(f, "E3"),
        }
    }
}

impl FromStr for ProficiencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "E1" => Ok(ProficiencyLevel::E1),
            "E2" => Ok(ProficiencyLevel::E2),
            "E3" => Ok(ProficiencyLevel::E3),
            other => Err(format!("unknown proficiency level: {other}")),
        }
    }
}

/// Grouping used by level-based breakdowns: one level or everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LevelFilter {
    Level(ProficiencyLevel),
    All,
}

impl LevelFilter {
    pub const ALL: [LevelFilter; 4] = [
        LevelFilter::Level(ProficiencyLevel::E1),
        LevelFilter::Level(ProficiencyLevel::E2),
        LevelFilter::Level(ProficiencyLevel::E3),
        LevelFilter::All,
    ];

    pub fn matches(self, level: Option<ProficiencyLevel>) -> bool {
        match self {
            LevelFilter::All => true,
            LevelFilter::Level(l) => level == Some(l),
        }
    }
}

impl fmt::Display for LevelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelFilter::Level(l) => write!(f, "{l}"),
            LevelFilter::All => write!(f, "All"),
        }
    }
}

/// One growth horizon (Fall→Spring or Fall→Fall) as reported in the export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthBlock {
    pub projected_growth: Option<f64>,
    pub observed_growth: Option<f64>,
    pub observed_growth_se: Option<f64>,
    pub met_projected_growth: Option<bool>,
    /// Peer-normalized growth residual.
    pub conditional_growth_index: Option<f64>,
    pub conditional_growth_percentile: Option<f64>,
    pub growth_quintile: Option<String>,
}

impl GrowthBlock {
    pub fn is_empty(&self) -> bool {
        self == &GrowthBlock::default()
    }
}

/// Score on one goal (skill domain) of a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalScore {
    /// 1-based position of the column group this came from.
    pub index: u8,
    pub name: String,
    pub rit_score: Option<f64>,
    pub std_err: Option<f64>,
    /// Range string such as `"191-201"`.
    pub range: Option<String>,
    pub adjective: Option<String>,
}

/// Projected proficiency on an external study, e.g. a state test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedProficiency {
    pub index: u8,
    pub study: String,
    pub level: Option<String>,
}

/// One validated row of an assessment export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    pub student_id: String,
    /// Grade at time of testing; kindergarten is 0.
    pub grade: u8,
    pub course: Course,
    /// Label exactly as it appeared in the file.
    pub term_name: String,
    pub term: TermKey,
    pub rit_score: u16,
    /// Decile containing the score, e.g. `"190-199"`.
    pub rit_range: String,
    #[serde(default)]
    pub standard_error: Option<f64>,
    #[serde(default)]
    pub percentile: Option<u8>,
    #[serde(default)]
    pub achievement_quintile: Option<String>,
    #[serde(default)]
    pub percent_correct: Option<f64>,
    #[serde(default)]
    pub rapid_guessing_percent: Option<f64>,
    #[serde(default)]
    pub test_date: Option<NaiveDate>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    /// Beginning-reader (BR) values are negative.
    #[serde(default)]
    pub lexile_score: Option<i32>,
    #[serde(default)]
    pub lexile_range: Option<String>,
    #[serde(default)]
    pub fall_to_spring: Option<GrowthBlock>,
    #[serde(default)]
    pub fall_to_fall: Option<GrowthBlock>,
    #[serde(default)]
    pub goals: Vec<GoalScore>,
    #[serde(default)]
    pub projected_proficiency: Vec<ProjectedProficiency>,
}

impl AssessmentRecord {
    pub fn academic_year(&self) -> String {
        self.term.academic_year()
    }

    pub fn season(&self) -> Season {
        self.term.season
    }
}

/// Current roster metadata for a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub grade: u8,
    #[serde(default)]
    pub level: Option<ProficiencyLevel>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// An assessment record joined with the student's current metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRecord {
    pub record: AssessmentRecord,
    pub student: StudentProfile,
}

/// One row of the national norm reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormReference {
    pub term: TermKey,
    pub grade: u8,
    pub course: Course,
    pub expected_rit: f64,
    /// Growth expected from the Fall of the same academic year to this term.
    #[serde(default)]
    pub expected_growth: Option<f64>,
}

/// Grade-specific cutoffs for the composite benchmark tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkThreshold {
    pub grade: u8,
    /// Composite averages at or above this are E1.
    pub e1_min: f64,
    /// Composite averages at or above this (and below `e1_min`) are E2.
    pub e2_min: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_display_and_parse() {
        assert_eq!(Course::Reading.to_string(), "Reading");
        assert_eq!(Course::LanguageUsage.to_string(), "Language Usage");
        assert_eq!("reading".parse::<Course>().unwrap(), Course::Reading);
        assert_eq!(
            "Language Usage".parse::<Course>().unwrap(),
            Course::LanguageUsage
        );
        assert_eq!(
            "LanguageUsage".parse::<Course>().unwrap(),
            Course::LanguageUsage
        );
        assert!("Mathematics".parse::<Course>().is_err());
    }

    #[test]
    fn tier_rank_puts_e1_on_top() {
        assert!(BenchmarkTier::E1.rank() > BenchmarkTier::E2.rank());
        assert!(BenchmarkTier::E2.rank() > BenchmarkTier::E3.rank());
        assert_eq!(BenchmarkTier::E3.index(), 2);
    }

    #[test]
    fn level_filter_matching() {
        assert!(LevelFilter::All.matches(None));
        assert!(LevelFilter::Level(ProficiencyLevel::E2).matches(Some(ProficiencyLevel::E2)));
        assert!(!LevelFilter::Level(ProficiencyLevel::E2).matches(Some(ProficiencyLevel::E1)));
        assert!(!LevelFilter::Level(ProficiencyLevel::E2).matches(None));
    }

    #[test]
    fn student_profile_defaults_to_active() {
        let json = r#"{"student_id":"20190001","grade":4}"#;
        let profile: StudentProfile = serde_json::from_str(json).unwrap();
        assert!(profile.active);
        assert!(profile.level.is_none());
    }
}
