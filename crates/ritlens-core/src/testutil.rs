//! Record builders shared by unit tests.

use crate::model::{AssessmentRecord, Course, JoinedRecord, ProficiencyLevel, StudentProfile};
use crate::parser::rit_decile;
use crate::term::TermKey;

pub(crate) fn record(student_id: &str, grade: u8, course: Course, term: &str, rit: u16) -> AssessmentRecord {
    AssessmentRecord {
        student_id: student_id.to_string(),
        grade,
        course,
        term_name: term.to_string(),
        term: TermKey::parse(term).unwrap(),
        rit_score: rit,
        rit_range: rit_decile(rit),
        standard_error: None,
        percentile: None,
        achievement_quintile: None,
        percent_correct: None,
        rapid_guessing_percent: None,
        test_date: None,
        duration_minutes: None,
        lexile_score: None,
        lexile_range: None,
        fall_to_spring: None,
        fall_to_fall: None,
        goals: vec![],
        projected_proficiency: vec![],
    }
}

pub(crate) fn joined(
    student_id: &str,
    grade: u8,
    course: Course,
    term: &str,
    rit: u16,
    level: Option<ProficiencyLevel>,
) -> JoinedRecord {
    JoinedRecord {
        record: record(student_id, grade, course, term, rit),
        student: StudentProfile {
            student_id: student_id.to_string(),
            name: None,
            grade,
            level,
            active: true,
        },
    }
}

/// Reading and Language Usage records for one student in one term.
pub(crate) fn pair(student_id: &str, grade: u8, term: &str, reading: u16, language: u16) -> Vec<JoinedRecord> {
    vec![
        joined(student_id, grade, Course::Reading, term, reading, None),
        joined(student_id, grade, Course::LanguageUsage, term, language, None),
    ]
}
