//! Aggregation query layer.
//!
//! Each query pulls records through the [`RecordSource`], then runs one of
//! the pure analyzers over them. Queries race the fetch against a
//! [`CancellationToken`] and never return partial data once cancelled.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::classifier::{benchmark_distribution, BenchmarkDistribution, BenchmarkThresholds};
use crate::cohort::{track_cohort, CohortTrajectory};
use crate::error::AnalyticsError;
use crate::goals::{goal_performance, GoalPerformance};
use crate::growth::{analyze_growth, compare_to_norm, GrowthAnalysis, NormComparison, NormTable};
use crate::lexile::{lexile_distribution, LexileDistribution};
use crate::model::{Course, JoinedRecord};
use crate::quality::{test_quality, TestQualityReport, DEFAULT_FLAG_THRESHOLD};
use crate::report::{DashboardReport, SectionStatus};
use crate::statistics::{
    group_averages, level_term_series, term_overview, GroupAverage, GroupBy, LevelTermSeries,
    TermOverviewRow,
};
use crate::term::{Season, TermKey};
use crate::traits::{RecordBatch, RecordQuery, RecordSource};
use crate::transition::{transition_matrix, BenchmarkTransitionMatrix};

/// Configuration for the analytics engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum rows a single fetch may return.
    pub row_cap: usize,
    /// Rapid-guessing percentage above which a test is flagged.
    pub rapid_guess_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            row_cap: 50_000,
            rapid_guess_threshold: DEFAULT_FLAG_THRESHOLD,
        }
    }
}

/// A query result plus how much data produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome<T> {
    pub data: T,
    pub rows_read: usize,
    /// The fetch hit the row cap; `data` covers a truncated population.
    pub row_cap_hit: bool,
}

impl<T> QueryOutcome<T> {
    fn status(&self, section: &str) -> SectionStatus {
        SectionStatus {
            section: section.to_string(),
            rows_read: self.rows_read,
            row_cap_hit: self.row_cap_hit,
        }
    }
}

/// One page's worth of aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardRequest {
    pub term: TermKey,
    pub grade: u8,
    /// Earlier term for the transition matrix.
    #[serde(default)]
    pub transition_from: Option<TermKey>,
    #[serde(default)]
    pub cohort_prefix: Option<String>,
}

/// The central analytics engine.
pub struct AnalyticsEngine {
    source: Arc<dyn RecordSource>,
    norms: NormTable,
    thresholds: BenchmarkThresholds,
    config: EngineConfig,
}

impl AnalyticsEngine {
    pub fn new(
        source: Arc<dyn RecordSource>,
        norms: NormTable,
        thresholds: BenchmarkThresholds,
        config: EngineConfig,
    ) -> Self {
        Self {
            source,
            norms,
            thresholds,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn norms(&self) -> &NormTable {
        &self.norms
    }

    pub fn thresholds(&self) -> &BenchmarkThresholds {
        &self.thresholds
    }

    async fn fetch(
        &self,
        query: RecordQuery,
        cancel: &CancellationToken,
    ) -> Result<RecordBatch, AnalyticsError> {
        if cancel.is_cancelled() {
            return Err(AnalyticsError::Cancelled);
        }
        let query = query.limit(self.config.row_cap);

        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AnalyticsError::Cancelled),
            result = self.source.fetch_records(&query) => result?,
        };

        if batch.truncated {
            tracing::warn!(
                source = self.source.name(),
                row_cap = self.config.row_cap,
                "row cap reached, results cover a truncated population"
            );
        }
        Ok(batch)
    }

    /// Fetch, then run `analyze` over the batch unless cancelled meanwhile.
    async fn run<T>(
        &self,
        query: RecordQuery,
        cancel: &CancellationToken,
        analyze: impl FnOnce(&[JoinedRecord]) -> T,
    ) -> Result<QueryOutcome<T>, AnalyticsError> {
        let batch = self.fetch(query, cancel).await?;
        let data = analyze(&batch.records);
        if cancel.is_cancelled() {
            return Err(AnalyticsError::Cancelled);
        }
        Ok(QueryOutcome {
            data,
            rows_read: batch.records.len(),
            row_cap_hit: batch.truncated,
        })
    }

    /// Mean RIT per level, grade or course for one term.
    pub async fn group_averages(
        &self,
        term: TermKey,
        by: GroupBy,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<Vec<GroupAverage>>, AnalyticsError> {
        self.run(RecordQuery::for_terms([term]), cancel, |records| {
            group_averages(records, term, by)
        })
        .await
    }

    /// Per-level average RIT over every term on record.
    pub async fn level_term_series(
        &self,
        grade: u8,
        course: Course,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<Vec<LevelTermSeries>>, AnalyticsError> {
        let query = RecordQuery::default().grade(grade).course(course);
        self.run(query, cancel, |records| level_term_series(records, course))
            .await
    }

    pub async fn term_overview(
        &self,
        grade: u8,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<Vec<TermOverviewRow>>, AnalyticsError> {
        self.run(RecordQuery::default().grade(grade), cancel, |records| {
            term_overview(records, grade, &self.norms)
        })
        .await
    }

    pub async fn norm_comparison(
        &self,
        term: TermKey,
        grade: u8,
        course: Course,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<Option<NormComparison>>, AnalyticsError> {
        let query = RecordQuery::for_terms([term]).grade(grade).course(course);
        self.run(query, cancel, |records| {
            compare_to_norm(records, term, grade, course, &self.norms)
        })
        .await
    }

    /// Fall→Spring growth for `year_start`, plus the following Fall's
    /// Fall→Fall blocks.
    pub async fn growth_analysis(
        &self,
        year_start: u16,
        grade: u8,
        course: Course,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<GrowthAnalysis>, AnalyticsError> {
        let fall = TermKey::new(Season::Fall, year_start);
        let query = RecordQuery::for_terms([
            fall,
            TermKey::new(Season::Spring, year_start),
            fall.next_year(),
        ])
        .course(course);
        self.run(query, cancel, |records| {
            analyze_growth(records, year_start, grade, course, &self.norms)
        })
        .await
    }

    pub async fn goal_performance(
        &self,
        term: TermKey,
        grade: u8,
        course: Course,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<GoalPerformance>, AnalyticsError> {
        let query = RecordQuery::for_terms([term]).grade(grade).course(course);
        self.run(query, cancel, |records| {
            goal_performance(records, term, grade, course)
        })
        .await
    }

    pub async fn lexile(
        &self,
        term: TermKey,
        grade: Option<u8>,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<LexileDistribution>, AnalyticsError> {
        let mut query = RecordQuery::for_terms([term]).course(Course::Reading);
        query.grade = grade;
        self.run(query, cancel, |records| {
            lexile_distribution(records, term, grade)
        })
        .await
    }

    pub async fn test_quality(
        &self,
        term: TermKey,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<TestQualityReport>, AnalyticsError> {
        let threshold = self.config.rapid_guess_threshold;
        self.run(RecordQuery::for_terms([term]), cancel, |records| {
            test_quality(records, threshold)
        })
        .await
    }

    pub async fn benchmark_distribution(
        &self,
        term: TermKey,
        grade: Option<u8>,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<BenchmarkDistribution>, AnalyticsError> {
        let mut query = RecordQuery::for_terms([term]);
        query.grade = grade;
        self.run(query, cancel, |records| {
            benchmark_distribution(records, term, grade, &self.thresholds)
        })
        .await
    }

    pub async fn transition_matrix(
        &self,
        grade: u8,
        from: TermKey,
        to: TermKey,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<BenchmarkTransitionMatrix>, AnalyticsError> {
        if from >= to {
            return Err(AnalyticsError::InvalidRequest(format!(
                "transition must go forward in time ({from} -> {to})"
            )));
        }
        // No grade filter: students move up a grade between the two terms.
        self.run(RecordQuery::for_terms([from, to]), cancel, |records| {
            transition_matrix(records, grade, from, to, &self.thresholds)
        })
        .await
    }

    pub async fn cohort(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryOutcome<CohortTrajectory>, AnalyticsError> {
        if prefix.is_empty() {
            return Err(AnalyticsError::InvalidRequest(
                "cohort prefix must not be empty".to_string(),
            ));
        }
        let query = RecordQuery::default().student_id_prefix(prefix).active_only();
        self.run(query, cancel, |records| {
            track_cohort(records, prefix, &self.norms)
        })
        .await
    }

    /// Every aggregate for one page, fetched concurrently.
    ///
    /// The first failing section cancels the rest and its error is returned.
    pub async fn dashboard(
        &self,
        request: &DashboardRequest,
        cancel: &CancellationToken,
    ) -> Result<DashboardReport, AnalyticsError> {
        let start = Instant::now();
        let branch = cancel.child_token();
        let (term, grade) = (request.term, request.grade);
        let (reading, language) = (Course::Reading, Course::LanguageUsage);

        let result = futures::try_join!(
            self.benchmark_distribution(term, Some(grade), &branch),
            self.norm_comparison(term, grade, reading, &branch),
            self.norm_comparison(term, grade, language, &branch),
            self.growth_analysis(term.year_start, grade, reading, &branch),
            self.growth_analysis(term.year_start, grade, language, &branch),
            self.goal_performance(term, grade, reading, &branch),
            self.goal_performance(term, grade, language, &branch),
            self.lexile(term, Some(grade), &branch),
            self.test_quality(term, &branch),
            async {
                match request.transition_from {
                    Some(from) => self
                        .transition_matrix(grade, from, term, &branch)
                        .await
                        .map(Some),
                    None => Ok(None),
                }
            },
            async {
                match request.cohort_prefix.as_deref() {
                    Some(prefix) => self.cohort(prefix, &branch).await.map(Some),
                    None => Ok(None),
                }
            },
        );

        let (
            distribution,
            reading_norm,
            language_norm,
            reading_growth,
            language_growth,
            reading_goals,
            language_goals,
            lexile,
            quality,
            transition,
            cohort,
        ) = match result {
            Ok(sections) => sections,
            Err(e) => {
                branch.cancel();
                if !e.is_cancelled() {
                    tracing::warn!(%term, grade, "dashboard aborted: {e}");
                }
                return Err(e);
            }
        };

        let mut sections = vec![
            distribution.status("benchmark_distribution"),
            reading_norm.status("norm_comparison.reading"),
            language_norm.status("norm_comparison.language_usage"),
            reading_growth.status("growth.reading"),
            language_growth.status("growth.language_usage"),
            reading_goals.status("goals.reading"),
            language_goals.status("goals.language_usage"),
            lexile.status("lexile"),
            quality.status("test_quality"),
        ];
        if let Some(t) = &transition {
            sections.push(t.status("transition"));
        }
        if let Some(c) = &cohort {
            sections.push(c.status("cohort"));
        }

        let report = DashboardReport {
            id: Uuid::new_v4(),
            created_at: chrono::Utc::now(),
            request: request.clone(),
            distribution: distribution.data,
            norm_comparisons: [reading_norm.data, language_norm.data]
                .into_iter()
                .flatten()
                .collect(),
            growth: vec![reading_growth.data, language_growth.data],
            goals: vec![reading_goals.data, language_goals.data],
            lexile: lexile.data,
            quality: quality.data,
            transition: transition.map(|t| t.data),
            cohort: cohort.map(|c| c.data),
            sections,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        let unmatched = report.unmatched_norms();
        if !unmatched.is_empty() {
            tracing::warn!(%term, grade, ?unmatched, "no national norm row for course(s)");
        }

        tracing::info!(
            %term,
            grade,
            rows_read = report.rows_read(),
            truncated = report.any_truncated(),
            "dashboard built"
        );
        Ok(report)
    }
}
