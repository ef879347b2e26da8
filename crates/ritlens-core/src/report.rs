//! Page-level dashboard report with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::BenchmarkDistribution;
use crate::cohort::CohortTrajectory;
use crate::engine::DashboardRequest;
use crate::goals::GoalPerformance;
use crate::growth::{GrowthAnalysis, NormComparison};
use crate::lexile::LexileDistribution;
use crate::model::Course;
use crate::quality::TestQualityReport;
use crate::transition::BenchmarkTransitionMatrix;

/// Rows behind one report section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionStatus {
    pub section: String,
    pub rows_read: usize,
    pub row_cap_hit: bool,
}

/// Every aggregate for one (term, grade) page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub request: DashboardRequest,
    pub distribution: BenchmarkDistribution,
    /// One entry per course with records for the term, whether or not the
    /// norm table has a row for it.
    pub norm_comparisons: Vec<NormComparison>,
    pub growth: Vec<GrowthAnalysis>,
    pub goals: Vec<GoalPerformance>,
    pub lexile: LexileDistribution,
    pub quality: TestQualityReport,
    #[serde(default)]
    pub transition: Option<BenchmarkTransitionMatrix>,
    #[serde(default)]
    pub cohort: Option<CohortTrajectory>,
    pub sections: Vec<SectionStatus>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl DashboardReport {
    /// Rows read across all sections.
    pub fn rows_read(&self) -> usize {
        self.sections.iter().map(|s| s.rows_read).sum()
    }

    /// Courses with records but no national norm row.
    pub fn unmatched_norms(&self) -> Vec<Course> {
        self.norm_comparisons
            .iter()
            .filter(|c| !c.has_norm())
            .map(|c| c.course)
            .collect()
    }

    /// Whether any section was computed over a truncated population.
    pub fn any_truncated(&self) -> bool {
        self.sections.iter().any(|s| s.row_cap_hit)
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: DashboardReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}
