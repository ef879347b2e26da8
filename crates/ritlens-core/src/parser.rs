//! Assessment export parser.
//!
//! Turns the text of one delimited export file into validated
//! [`AssessmentRecord`]s. Columns are located by header name, never by
//! position, and a bad row is skipped with a structured error instead of
//! failing the whole file. Only a missing required column aborts the parse.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    AssessmentRecord, Course, GoalScore, GrowthBlock, ProjectedProficiency, RIT_MAX, RIT_MIN,
};
use crate::term::TermKey;

/// Required columns, in the order their absence is reported.
pub const REQUIRED_COLUMNS: [&str; 5] = ["StudentID", "Grade", "Course", "TestRITScore", "TermName"];

/// Lowest Lexile measure accepted (`BR2000L`).
pub const LEXILE_MIN: i32 = -2000;
/// Highest Lexile measure accepted.
pub const LEXILE_MAX: i32 = 2500;

/// Header aliases accepted for required columns.
const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("StudentID", &["StudentID", "StudentNumber"]),
    ("Grade", &["Grade", "StudentGrade"]),
    ("Course", &["Course", "Subject"]),
    ("TestRITScore", &["TestRITScore", "RITScore"]),
    ("TermName", &["TermName", "TermTested"]),
];

/// Parser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Highest `Goal{k}…` group index probed.
    #[serde(default = "default_max_goals")]
    pub max_goals: u8,
    /// Highest `ProjectedProficiencyStudy{k}` index probed.
    #[serde(default = "default_max_projected_proficiency")]
    pub max_projected_proficiency: u8,
    #[serde(default)]
    pub grade_min: u8,
    #[serde(default = "default_grade_max")]
    pub grade_max: u8,
    #[serde(default = "default_student_id_pattern")]
    pub student_id_pattern: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_max_goals() -> u8 {
    8
}

fn default_max_projected_proficiency() -> u8 {
    4
}

fn default_grade_max() -> u8 {
    12
}

fn default_student_id_pattern() -> String {
    "^[0-9]{6,10}$".to_string()
}

fn default_delimiter() -> char {
    ','
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_goals: default_max_goals(),
            max_projected_proficiency: default_max_projected_proficiency(),
            grade_min: 0,
            grade_max: default_grade_max(),
            student_id_pattern: default_student_id_pattern(),
            delimiter: default_delimiter(),
        }
    }
}

/// A parser configuration that cannot be used.
#[derive(Debug, Error)]
pub enum ParserConfigError {
    #[error("invalid student id pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("grade range {min}..={max} is empty")]
    GradeRange { min: u8, max: u8 },

    #[error("delimiter must be a single-byte character, got {0:?}")]
    Delimiter(char),
}

/// A validation failure. `row` is `None` for a missing required column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    /// 1-based line number where the row starts (the header is line 1).
    pub row: Option<usize>,
    pub field: String,
    pub value: String,
    pub message: String,
}

/// An optional value that could not be coerced and was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseWarning {
    pub row: usize,
    pub field: String,
    pub value: String,
    pub message: String,
}

/// Row counts for one parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseStats {
    /// Non-blank data rows seen.
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    pub by_grade: BTreeMap<u8, usize>,
    pub by_course: BTreeMap<Course, usize>,
    pub by_term: BTreeMap<TermKey, usize>,
}

/// Outcome of parsing one export file.
///
/// `success` is advisory: it is `false` both when the header is unusable and
/// when any row was skipped. `stats` and `errors` are the authoritative
/// signal for callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseResult {
    pub success: bool,
    pub records: Vec<AssessmentRecord>,
    pub errors: Vec<ParseError>,
    #[serde(default)]
    pub warnings: Vec<ParseWarning>,
    pub stats: ParseStats,
}

impl ParseResult {
    /// `true` if the header check failed and no rows were read.
    pub fn is_header_failure(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(|e| e.row.is_none())
    }
}

/// Parse an export with the given configuration.
pub fn parse_export(content: &str, config: &ParserConfig) -> Result<ParseResult, ParserConfigError> {
    Ok(ExportParser::new(config.clone())?.parse(content))
}

/// A configured, reusable parser. Parsing is pure and reentrant.
#[derive(Debug, Clone)]
pub struct ExportParser {
    config: ParserConfig,
    student_id: Regex,
    delimiter: u8,
}

impl ExportParser {
    pub fn new(config: ParserConfig) -> Result<Self, ParserConfigError> {
        if config.grade_min > config.grade_max {
            return Err(ParserConfigError::GradeRange {
                min: config.grade_min,
                max: config.grade_max,
            });
        }
        let delimiter = u8::try_from(config.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ParserConfigError::Delimiter(config.delimiter))?;
        let student_id = Regex::new(&config.student_id_pattern)?;
        Ok(Self {
            config,
            student_id,
            delimiter,
        })
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse the full text of one export file.
    pub fn parse(&self, content: &str) -> ParseResult {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut result = ParseResult::default();
        let mut records = reader.records();

        let header = match records.next() {
            Some(Ok(header)) => header,
            Some(Err(e)) => {
                result.errors.push(ParseError {
                    row: Some(1),
                    field: "header".into(),
                    value: String::new(),
                    message: format!("unreadable header row: {e}"),
                });
                return result;
            }
            None => csv::StringRecord::new(),
        };

        let columns = match ColumnMap::resolve(&header, &self.config) {
            Ok(columns) => columns,
            Err(missing) => {
                tracing::warn!("export rejected: missing required columns {:?}", missing);
                result.errors = missing
                    .into_iter()
                    .map(|name| ParseError {
                        row: None,
                        field: name.to_string(),
                        value: String::new(),
                        message: format!("required column '{name}' is missing from the header"),
                    })
                    .collect();
                return result;
            }
        };

        for (offset, row) in records.enumerate() {
            let line = match &row {
                Ok(r) => r.position().map(|p| p.line() as usize),
                Err(e) => e.position().map(|p| p.line() as usize),
            }
            .unwrap_or(offset + 2);

            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    result.stats.total += 1;
                    result.stats.invalid += 1;
                    result.errors.push(ParseError {
                        row: Some(line),
                        field: "row".into(),
                        value: String::new(),
                        message: format!("could not tokenize row: {e}"),
                    });
                    continue;
                }
            };

            if row.iter().all(str::is_empty) {
                continue;
            }
            result.stats.total += 1;

            let mut fields = RowReader {
                line,
                row: &row,
                columns: &columns,
                warnings: &mut result.warnings,
            };

            match self.parse_row(&mut fields) {
                Ok(record) => {
                    result.stats.valid += 1;
                    *result.stats.by_grade.entry(record.grade).or_default() += 1;
                    *result.stats.by_course.entry(record.course).or_default() += 1;
                    *result.stats.by_term.entry(record.term).or_default() += 1;
                    result.records.push(record);
                }
                Err(error) => {
                    tracing::debug!(
                        row = line,
                        field = %error.field,
                        "skipping row: {}",
                        error.message
                    );
                    result.stats.invalid += 1;
                    result.errors.push(error);
                }
            }
        }

        result.success = result.errors.is_empty();
        tracing::info!(
            total = result.stats.total,
            valid = result.stats.valid,
            invalid = result.stats.invalid,
            warnings = result.warnings.len(),
            "parsed assessment export"
        );
        result
    }

    fn parse_row(&self, r: &mut RowReader<'_>) -> Result<AssessmentRecord, ParseError> {
        let cols = r.columns;

        let student_id = r.required(cols.student_id)?;
        if !self.student_id.is_match(student_id) {
            return Err(r.error(
                cols.student_id,
                student_id,
                format!(
                    "student id does not match pattern {}",
                    self.config.student_id_pattern
                ),
            ));
        }

        let grade_raw = r.required(cols.grade)?;
        let grade = parse_grade(grade_raw)
            .filter(|g| (self.config.grade_min..=self.config.grade_max).contains(g))
            .ok_or_else(|| {
                r.error(
                    cols.grade,
                    grade_raw,
                    format!(
                        "grade must be an integer between {} and {}",
                        self.config.grade_min, self.config.grade_max
                    ),
                )
            })?;

        let course_raw = r.required(cols.course)?;
        let course: Course = course_raw
            .parse()
            .map_err(|_| r.error(cols.course, course_raw, "course must be Reading or Language Usage"))?;

        let rit_raw = r.required(cols.rit_score)?;
        let rit_score = parse_whole(rit_raw)
            .filter(|v| (RIT_MIN as i64..=RIT_MAX as i64).contains(v))
            .map(|v| v as u16)
            .ok_or_else(|| {
                r.error(
                    cols.rit_score,
                    rit_raw,
                    format!("RIT score must be an integer between {RIT_MIN} and {RIT_MAX}"),
                )
            })?;

        let term_raw = r.required(cols.term_name)?;
        let term = TermKey::parse(term_raw)
            .map_err(|e| r.error(cols.term_name, term_raw, e.to_string()))?;

        let lexile_min = r.lexile(cols.lexile_min);
        let lexile_max = r.lexile(cols.lexile_max);
        let lexile_range = match (lexile_min, lexile_max) {
            (Some(min), Some(max)) => Some(format!("{}-{}", format_lexile(min), format_lexile(max))),
            _ => r.text(cols.lexile_range).map(str::to_string),
        };

        Ok(AssessmentRecord {
            student_id: student_id.to_string(),
            grade,
            course,
            term_name: term_raw.to_string(),
            term,
            rit_score,
            rit_range: rit_decile(rit_score),
            standard_error: r.number(cols.standard_error),
            percentile: r
                .number(cols.percentile)
                .and_then(|p| r.check(cols.percentile, p, (0.0..=100.0).contains(&p), "percentile out of range"))
                .map(|p| p.round() as u8),
            achievement_quintile: r.text(cols.achievement_quintile).map(str::to_string),
            percent_correct: r.percent(cols.percent_correct),
            rapid_guessing_percent: r.percent(cols.rapid_guessing),
            test_date: r.date(cols.test_date),
            duration_minutes: r
                .number(cols.duration)
                .and_then(|d| r.check(cols.duration, d, d >= 0.0, "duration is negative"))
                .map(|d| d.round() as u32),
            lexile_score: r.lexile(cols.lexile_score),
            lexile_range,
            fall_to_spring: r.growth(&cols.fall_to_spring),
            fall_to_fall: r.growth(&cols.fall_to_fall),
            goals: cols
                .goals
                .iter()
                .filter_map(|g| {
                    let name = r.text(g.name)?.to_string();
                    Some(GoalScore {
                        index: g.index,
                        name,
                        rit_score: r.number(g.rit_score),
                        std_err: r.number(g.std_err),
                        range: r.text(g.range).map(str::to_string),
                        adjective: r.text(g.adjective).map(str::to_string),
                    })
                })
                .collect(),
            projected_proficiency: cols
                .projections
                .iter()
                .filter_map(|p| {
                    Some(ProjectedProficiency {
                        index: p.index,
                        study: r.text(p.study)?.to_string(),
                        level: r.text(p.level).map(str::to_string),
                    })
                })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct GrowthColumns {
    projected: Option<usize>,
    observed: Option<usize>,
    observed_se: Option<usize>,
    met: Option<usize>,
    conditional_index: Option<usize>,
    conditional_percentile: Option<usize>,
    quintile: Option<usize>,
}

#[derive(Debug)]
struct GoalColumns {
    index: u8,
    name: Option<usize>,
    rit_score: Option<usize>,
    std_err: Option<usize>,
    range: Option<usize>,
    adjective: Option<usize>,
}

#[derive(Debug)]
struct ProjectionColumns {
    index: u8,
    study: Option<usize>,
    level: Option<usize>,
}

/// Column indices resolved from the header, once per file.
#[derive(Debug)]
struct ColumnMap {
    headers: Vec<String>,
    student_id: usize,
    grade: usize,
    course: usize,
    rit_score: usize,
    term_name: usize,
    standard_error: Option<usize>,
    percentile: Option<usize>,
    achievement_quintile: Option<usize>,
    percent_correct: Option<usize>,
    rapid_guessing: Option<usize>,
    test_date: Option<usize>,
    duration: Option<usize>,
    lexile_score: Option<usize>,
    lexile_min: Option<usize>,
    lexile_max: Option<usize>,
    lexile_range: Option<usize>,
    fall_to_spring: GrowthColumns,
    fall_to_fall: GrowthColumns,
    goals: Vec<GoalColumns>,
    projections: Vec<ProjectionColumns>,
}

/// Lowercase and drop everything but letters and digits.
fn normalize_header(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl ColumnMap {
    fn resolve(header: &csv::StringRecord, config: &ParserConfig) -> Result<Self, Vec<&'static str>> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (i, name) in header.iter().enumerate() {
            let key = normalize_header(name);
            if !key.is_empty() {
                index.entry(key).or_insert(i);
            }
        }
        let find = |name: &str| index.get(&normalize_header(name)).copied();

        let mut missing = Vec::new();
        let mut required = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, (canonical, aliases)) in required.iter_mut().zip(COLUMN_ALIASES) {
            match aliases.iter().find_map(|alias| find(*alias)) {
                Some(i) => *slot = i,
                None => missing.push(*canonical),
            }
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        let growth = |prefix: &str| GrowthColumns {
            projected: find(&format!("{prefix}ProjectedGrowth")),
            observed: find(&format!("{prefix}ObservedGrowth")),
            observed_se: find(&format!("{prefix}ObservedGrowthSE")),
            met: find(&format!("{prefix}MetProjectedGrowth")),
            conditional_index: find(&format!("{prefix}ConditionalGrowthIndex")),
            conditional_percentile: find(&format!("{prefix}ConditionalGrowthPercentile")),
            quintile: find(&format!("{prefix}GrowthQuintile")),
        };

        // Each index is probed on its own; a gap does not end the group.
        let goals = (1..=config.max_goals)
            .map(|k| GoalColumns {
                index: k,
                name: find(&format!("Goal{k}Name")),
                rit_score: find(&format!("Goal{k}RitScore")),
                std_err: find(&format!("Goal{k}StdErr")),
                range: find(&format!("Goal{k}Range")),
                adjective: find(&format!("Goal{k}Adjective")),
            })
            .filter(|g| g.name.is_some())
            .collect();

        let projections = (1..=config.max_projected_proficiency)
            .map(|k| ProjectionColumns {
                index: k,
                study: find(&format!("ProjectedProficiencyStudy{k}")),
                level: find(&format!("ProjectedProficiencyLevel{k}")),
            })
            .filter(|p| p.study.is_some())
            .collect();

        let [student_id, grade, course, rit_score, term_name] = required;

        Ok(Self {
            headers: header.iter().map(str::to_string).collect(),
            student_id,
            grade,
            course,
            rit_score,
            term_name,
            standard_error: find("TestStandardError"),
            percentile: find("TestPercentile"),
            achievement_quintile: find("AchievementQuintile"),
            percent_correct: find("PercentCorrect"),
            rapid_guessing: find("RapidGuessingPercentage"),
            test_date: find("TestStartDate"),
            duration: find("TestDurationMinutes"),
            lexile_score: find("LexileScore"),
            lexile_min: find("LexileMin"),
            lexile_max: find("LexileMax"),
            lexile_range: find("LexileRange"),
            fall_to_spring: growth("FallToSpring"),
            fall_to_fall: growth("FallToFall"),
            goals,
            projections,
        })
    }

    fn header(&self, col: usize) -> &str {
        self.headers.get(col).map(String::as_str).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Per-row field access
// ---------------------------------------------------------------------------

struct RowReader<'a> {
    line: usize,
    row: &'a csv::StringRecord,
    columns: &'a ColumnMap,
    warnings: &'a mut Vec<ParseWarning>,
}

impl<'a> RowReader<'a> {
    /// Trimmed, non-empty value of a column.
    fn text(&self, col: Option<usize>) -> Option<&'a str> {
        col.and_then(|c| self.row.get(c)).filter(|v| !v.is_empty())
    }

    fn required(&self, col: usize) -> Result<&'a str, ParseError> {
        self.text(Some(col))
            .ok_or_else(|| self.error(col, "", "required value is empty"))
    }

    fn error(&self, col: usize, value: &str, message: impl Into<String>) -> ParseError {
        ParseError {
            row: Some(self.line),
            field: self.columns.header(col).to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }

    fn warn(&mut self, col: Option<usize>, message: &str) {
        let Some(col) = col else { return };
        self.warnings.push(ParseWarning {
            row: self.line,
            field: self.columns.header(col).to_string(),
            value: self.row.get(col).unwrap_or("").to_string(),
            message: message.to_string(),
        });
    }

    /// Keep `value` if `ok`, otherwise drop it with a warning.
    fn check<T>(&mut self, col: Option<usize>, value: T, ok: bool, message: &str) -> Option<T> {
        if ok {
            Some(value)
        } else {
            self.warn(col, message);
            None
        }
    }

    fn number(&mut self, col: Option<usize>) -> Option<f64> {
        let raw = self.text(col)?;
        match raw.replace(',', "").parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.warn(col, "not a number");
                None
            }
        }
    }

    fn percent(&mut self, col: Option<usize>) -> Option<f64> {
        let raw = self.text(col)?;
        match raw.trim_end_matches('%').trim().parse::<f64>() {
            Ok(v) if (0.0..=100.0).contains(&v) => Some(v),
            _ => {
                self.warn(col, "not a percentage between 0 and 100");
                None
            }
        }
    }

    fn flag(&mut self, col: Option<usize>) -> Option<bool> {
        let raw = self.text(col)?;
        match raw.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Some(true),
            "no" | "n" | "false" | "0" => Some(false),
            _ => {
                self.warn(col, "not a yes/no value");
                None
            }
        }
    }

    fn date(&mut self, col: Option<usize>) -> Option<NaiveDate> {
        let raw = self.text(col)?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.warn(col, "unrecognized date format");
        }
        parsed
    }

    fn lexile(&mut self, col: Option<usize>) -> Option<i32> {
        let raw = self.text(col)?;
        let parsed = parse_lexile(raw);
        if parsed.is_none() {
            self.warn(col, "unrecognized or out-of-range Lexile value");
        }
        parsed
    }

    fn growth(&mut self, cols: &GrowthColumns) -> Option<GrowthBlock> {
        let block = GrowthBlock {
            projected_growth: self.number(cols.projected),
            observed_growth: self.number(cols.observed),
            observed_growth_se: self.number(cols.observed_se),
            met_projected_growth: self.flag(cols.met),
            conditional_growth_index: self.number(cols.conditional_index),
            conditional_growth_percentile: self.number(cols.conditional_percentile),
            growth_quintile: self.text(cols.quintile).map(str::to_string),
        };
        (!block.is_empty()).then_some(block)
    }
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

fn parse_grade(raw: &str) -> Option<u8> {
    match raw.to_ascii_uppercase().as_str() {
        "K" | "KG" | "KINDERGARTEN" => Some(0),
        _ => parse_whole(raw).and_then(|g| u8::try_from(g).ok()),
    }
}

/// Integer, or a decimal with no fractional part (`"201.0"`).
fn parse_whole(raw: &str) -> Option<i64> {
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    (v.is_finite() && v.fract() == 0.0).then_some(v as i64)
}

/// Accepts `M/D/YYYY`, `YYYY-MM-DD` and `M/D/YY`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    // chrono's %Y also takes two digits, so pick the format by year width
    let format = if raw.contains('-') {
        "%Y-%m-%d"
    } else {
        match raw.rsplit('/').next().map(str::len) {
            Some(4) => "%m/%d/%Y",
            Some(2) => "%m/%d/%y",
            _ => return None,
        }
    };
    NaiveDate::parse_from_str(raw, format)
        .ok()
        .filter(|d| (1900..=2100).contains(&d.year()))
}

/// Accepts `850`, `850L` and beginning-reader `BR120L` (returned as -120).
///
/// Values outside [`LEXILE_MIN`]`..=`[`LEXILE_MAX`] are rejected.
pub fn parse_lexile(raw: &str) -> Option<i32> {
    let upper = raw.trim().to_ascii_uppercase();
    let body = upper.strip_suffix('L').unwrap_or(&upper).trim();
    let value = if let Some(br) = body.strip_prefix("BR") {
        let br = br.trim();
        if br.is_empty() {
            0
        } else {
            -br.parse::<i32>().ok().filter(|v| *v >= 0)?
        }
    } else {
        body.parse::<i32>().ok()?
    };
    (LEXILE_MIN..=LEXILE_MAX).contains(&value).then_some(value)
}

pub fn format_lexile(value: i32) -> String {
    if value < 0 {
        format!("BR{}L", -value)
    } else {
        format!("{value}L")
    }
}

/// Decile containing a RIT score, e.g. `195 -> "190-199"`.
pub fn rit_decile(score: u16) -> String {
    let low = score / 10 * 10;
    format!("{}-{}", low, low + 9)
}
