//! A directory of JSON files acting as the record store.
//!
//! Layout:
//!
//! ```text
//! <dir>/records.json    Vec<AssessmentRecord>
//! <dir>/students.json   Vec<StudentProfile>
//! ```
//!
//! Files are re-read on every query, so a store updated by `ingest` is
//! visible to the next report without restarting anything.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use ritlens_core::error::SourceError;
use ritlens_core::model::{AssessmentRecord, Course, JoinedRecord, StudentProfile};
use ritlens_core::term::TermKey;
use ritlens_core::traits::{RecordBatch, RecordQuery, RecordSource};

pub const RECORDS_FILE: &str = "records.json";
pub const STUDENTS_FILE: &str = "students.json";

/// What a write changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub new_students: usize,
    pub total_records: usize,
}

pub struct JsonStoreSource {
    dir: PathBuf,
}

impl JsonStoreSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>, SourceError> {
        let path = self.dir.join(file);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content)
            .map_err(|e| SourceError::Decode(format!("{}: {e}", path.display())))
    }

    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| SourceError::Decode(format!("failed to serialize {file}: {e}")))?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(file), json).await?;
        Ok(())
    }

    pub async fn load_records(&self) -> Result<Vec<AssessmentRecord>, SourceError> {
        self.read_json(RECORDS_FILE).await
    }

    pub async fn load_students(&self) -> Result<Vec<StudentProfile>, SourceError> {
        self.read_json(STUDENTS_FILE).await
    }

    /// Merge `records` into the store.
    ///
    /// A record replaces an existing one with the same student, course, term
    /// and test date. Students not yet on the roster get a profile with no
    /// level assigned; existing profiles are kept as they are.
    pub async fn write_records(&self, records: &[AssessmentRecord]) -> Result<WriteSummary, SourceError> {
        type Key = (String, Course, TermKey, Option<NaiveDate>);
        let key = |r: &AssessmentRecord| -> Key {
            (r.student_id.clone(), r.course, r.term, r.test_date)
        };

        let existing = self.load_records().await?;
        let mut merged: BTreeMap<Key, AssessmentRecord> =
            existing.into_iter().map(|r| (key(&r), r)).collect();

        let mut summary = WriteSummary::default();
        for record in records {
            match merged.insert(key(record), record.clone()) {
                Some(_) => summary.replaced += 1,
                None => summary.inserted += 1,
            }
        }

        let mut students: BTreeMap<String, StudentProfile> = self
            .load_students()
            .await?
            .into_iter()
            .map(|s| (s.student_id.clone(), s))
            .collect();
        for record in records {
            if !students.contains_key(&record.student_id) {
                students.insert(record.student_id.clone(), skeleton_profile(record));
                summary.new_students += 1;
            }
        }

        let merged: Vec<AssessmentRecord> = merged.into_values().collect();
        summary.total_records = merged.len();
        self.write_json(RECORDS_FILE, &merged).await?;
        self.write_json(STUDENTS_FILE, &students.into_values().collect::<Vec<_>>())
            .await?;

        tracing::info!(
            dir = %self.dir.display(),
            inserted = summary.inserted,
            replaced = summary.replaced,
            new_students = summary.new_students,
            "record store updated"
        );
        Ok(summary)
    }
}

fn skeleton_profile(record: &AssessmentRecord) -> StudentProfile {
    StudentProfile {
        student_id: record.student_id.clone(),
        name: None,
        grade: record.grade,
        level: None,
        active: true,
    }
}

#[async_trait]
impl RecordSource for JsonStoreSource {
    fn name(&self) -> &str {
        "json-store"
    }

    async fn fetch_records(&self, query: &RecordQuery) -> Result<RecordBatch, SourceError> {
        if !self.dir.is_dir() {
            return Err(SourceError::Unavailable(format!(
                "store directory {} does not exist",
                self.dir.display()
            )));
        }

        let (records, students) = tokio::try_join!(self.load_records(), self.load_students())?;
        let profiles: HashMap<&str, &StudentProfile> =
            students.iter().map(|s| (s.student_id.as_str(), s)).collect();

        let mut unrostered = 0usize;
        let joined: Vec<JoinedRecord> = records
            .into_iter()
            .map(|record| {
                let student = match profiles.get(record.student_id.as_str()) {
                    Some(profile) => (*profile).clone(),
                    None => {
                        unrostered += 1;
                        skeleton_profile(&record)
                    }
                };
                JoinedRecord { record, student }
            })
            .collect();
        if unrostered > 0 {
            tracing::debug!(unrostered, "records without a student profile");
        }

        Ok(query.apply(&joined))
    }
}
