//! The read-side seam between the engine and wherever records live.
//!
//! Implemented by the `ritlens-sources` crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::model::{Course, JoinedRecord};
use crate::term::TermKey;

/// Read access to assessment records joined with student metadata.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Human-readable source name (e.g. "json-store").
    fn name(&self) -> &str;

    /// Fetch the records matching `query`, at most `query.limit` of them.
    async fn fetch_records(&self, query: &RecordQuery) -> Result<RecordBatch, SourceError>;
}

/// Record filter. Empty/`None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    /// Grade at test time.
    #[serde(default)]
    pub grade: Option<u8>,
    #[serde(default)]
    pub course: Option<Course>,
    #[serde(default)]
    pub terms: Vec<TermKey>,
    #[serde(default)]
    pub student_id_prefix: Option<String>,
    #[serde(default)]
    pub active_only: bool,
    /// Row cap; the source sets `truncated` when more rows matched.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RecordQuery {
    pub fn for_terms(terms: impl IntoIterator<Item = TermKey>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn grade(mut self, grade: u8) -> Self {
        self.grade = Some(grade);
        self
    }

    pub fn course(mut self, course: Course) -> Self {
        self.course = Some(course);
        self
    }

    pub fn student_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.student_id_prefix = Some(prefix.into());
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `jr` passes every filter (the limit is not considered).
    pub fn matches(&self, jr: &JoinedRecord) -> bool {
        self.grade.map_or(true, |g| jr.record.grade == g)
            && self.course.map_or(true, |c| jr.record.course == c)
            && (self.terms.is_empty() || self.terms.contains(&jr.record.term))
            && self
                .student_id_prefix
                .as_deref()
                .map_or(true, |p| jr.record.student_id.starts_with(p))
            && (!self.active_only || jr.student.active)
    }

    /// Filter `records` and apply the limit.
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a JoinedRecord>) -> RecordBatch {
        let mut out = Vec::new();
        let mut truncated = false;
        for jr in records.into_iter().filter(|jr| self.matches(jr)) {
            if self.limit.is_some_and(|cap| out.len() >= cap) {
                truncated = true;
                break;
            }
            out.push(jr.clone());
        }
        RecordBatch {
            records: out,
            truncated,
        }
    }
}

/// Records returned by a source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordBatch {
    pub records: Vec<JoinedRecord>,
    /// More rows matched than the query's limit allowed.
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{joined, pair};

    #[test]
    fn query_filters_compose() {
        let mut records = pair("20190001", 4, "Fall 2024-2025", 200, 201);
        records.extend(pair("20200001", 3, "Fall 2024-2025", 180, 181));
        records.push(joined("20190002", 4, Course::Reading, "Spring 2024-2025", 205, None));

        let query = RecordQuery::for_terms(["Fall 2024-2025".parse().unwrap()])
            .grade(4)
            .course(Course::Reading);
        let batch = query.apply(&records);
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].record.student_id, "20190001");
        assert!(!batch.truncated);

        let cohort = RecordQuery::default().student_id_prefix("2019");
        assert_eq!(cohort.apply(&records).records.len(), 3);
    }

    #[test]
    fn limit_marks_truncation() {
        let records = pair("20190001", 4, "Fall 2024-2025", 200, 201);
        let batch = RecordQuery::default().limit(1).apply(&records);
        assert_eq!(batch.records.len(), 1);
        assert!(batch.truncated);

        let exact = RecordQuery::default().limit(2).apply(&records);
        assert!(!exact.truncated);
    }

    #[test]
    fn active_only_skips_inactive_students() {
        let mut records = pair("20190001", 4, "Fall 2024-2025", 200, 201);
        records[1].student.active = false;
        assert_eq!(RecordQuery::default().active_only().apply(&records).records.len(), 1);
    }
}
