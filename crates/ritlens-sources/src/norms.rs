//! National norm table loading.
//!
//! The table is a CSV file with one row per (academic year, grade, season,
//! course):
//!
//! ```text
//! AcademicYear,Grade,Term,Course,ExpectedRIT,ExpectedGrowth
//! 2024-2025,4,Fall,Reading,199.0,
//! 2024-2025,4,Spring,Reading,206.0,7.2
//! ```

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use ritlens_core::growth::NormTable;
use ritlens_core::model::{Course, NormReference};
use ritlens_core::term::TermKey;

use crate::error::TableError;

#[derive(Debug, Deserialize)]
struct NormRow {
    #[serde(rename = "AcademicYear")]
    academic_year: String,
    #[serde(rename = "Grade")]
    grade: String,
    #[serde(rename = "Term")]
    term: String,
    #[serde(rename = "Course")]
    course: String,
    #[serde(rename = "ExpectedRIT")]
    expected_rit: f64,
    #[serde(rename = "ExpectedGrowth", default)]
    expected_growth: Option<f64>,
}

/// Parse a grade key: `K` (kindergarten, 0) or a number.
pub fn parse_grade_key(raw: &str) -> Result<u8, TableError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("k") {
        return Ok(0);
    }
    raw.parse::<u8>()
        .ok()
        .filter(|g| *g <= 12)
        .ok_or_else(|| TableError::GradeKey(raw.to_string()))
}

/// Read a norm table from CSV text.
pub fn parse_norms<R: Read>(input: R) -> Result<NormTable, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut references = Vec::new();
    for (i, result) in reader.deserialize::<NormRow>().enumerate() {
        let row = result?;
        // header is line 1
        let line = i as u64 + 2;
        let invalid = |message: String| TableError::InvalidRow { line, message };

        let term = TermKey::parse(&format!("{} {}", row.term, row.academic_year))
            .map_err(|e| invalid(e.to_string()))?;
        let grade = parse_grade_key(&row.grade).map_err(|e| invalid(e.to_string()))?;
        let course: Course = row
            .course
            .parse()
            .map_err(|_| invalid(format!("unknown course \"{}\"", row.course)))?;
        if !row.expected_rit.is_finite() {
            return Err(invalid("ExpectedRIT must be a finite number".to_string()));
        }

        references.push(NormReference {
            term,
            grade,
            course,
            expected_rit: row.expected_rit,
            expected_growth: row.expected_growth.filter(|g| g.is_finite()),
        });
    }

    tracing::debug!(rows = references.len(), "loaded norm table");
    Ok(NormTable::from_rows(references))
}

/// Load a norm table from a CSV file.
pub fn load_norms(path: &Path) -> Result<NormTable, TableError> {
    let file = std::fs::File::open(path)?;
    parse_norms(file)
}
