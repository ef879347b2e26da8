//! ritlens configuration and engine factory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ritlens_core::classifier::BenchmarkThresholds;
use ritlens_core::engine::{AnalyticsEngine, EngineConfig};
use ritlens_core::growth::NormTable;
use ritlens_core::model::BenchmarkThreshold;
use ritlens_core::parser::ParserConfig;
use ritlens_core::quality::DEFAULT_FLAG_THRESHOLD;

use crate::error::TableError;
use crate::json_store::JsonStoreSource;
use crate::norms::{load_norms, parse_grade_key};

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Maximum rows a single query may read.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,
    /// Rapid-guessing percentage above which a test is flagged.
    #[serde(default = "default_rapid_guess_threshold")]
    pub rapid_guess_threshold: f64,
    /// Max export files parsed concurrently.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

/// Cutoffs overriding the built-in table for one grade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdOverride {
    pub e1_min: f64,
    pub e2_min: f64,
}

/// Top-level ritlens configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RitlensConfig {
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Benchmark cutoffs keyed by grade (`"K"`, `"1"`, … `"12"`).
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdOverride>,
    /// National norm table (CSV).
    #[serde(default)]
    pub norms_path: Option<PathBuf>,
    /// Directory of the JSON record store.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_row_cap() -> usize {
    50_000
}
fn default_rapid_guess_threshold() -> f64 {
    DEFAULT_FLAG_THRESHOLD
}
fn default_parallelism() -> usize {
    4
}
fn default_store_dir() -> PathBuf {
    PathBuf::from("./ritlens-store")
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            row_cap: default_row_cap(),
            rapid_guess_threshold: default_rapid_guess_threshold(),
            parallelism: default_parallelism(),
        }
    }
}

impl Default for RitlensConfig {
    fn default() -> Self {
        Self {
            parser: ParserConfig::default(),
            analytics: AnalyticsConfig::default(),
            thresholds: BTreeMap::new(),
            norms_path: None,
            store_dir: default_store_dir(),
        }
    }
}

impl RitlensConfig {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            row_cap: self.analytics.row_cap,
            rapid_guess_threshold: self.analytics.rapid_guess_threshold,
        }
    }

    /// Built-in cutoffs with the configured grades replaced.
    pub fn benchmark_thresholds(&self) -> Result<BenchmarkThresholds, TableError> {
        let mut table = BenchmarkThresholds::default();
        for (key, cutoffs) in &self.thresholds {
            let grade = parse_grade_key(key)?;
            table.set(BenchmarkThreshold {
                grade,
                e1_min: cutoffs.e1_min,
                e2_min: cutoffs.e2_min,
            })?;
        }
        Ok(table)
    }

    /// The configured norm table, or an empty one when none is set.
    pub fn norm_table(&self) -> Result<NormTable> {
        match &self.norms_path {
            Some(path) => load_norms(path)
                .with_context(|| format!("failed to load norm table: {}", path.display())),
            None => {
                tracing::warn!("no norms_path configured, norm comparisons will be empty");
                Ok(NormTable::default())
            }
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `ritlens.toml` in the current directory
/// 2. `~/.config/ritlens/config.toml`
///
/// Environment variable overrides: `RITLENS_ROW_CAP`, `RITLENS_STORE_DIR`.
pub fn load_config() -> Result<RitlensConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<RitlensConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("ritlens.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<RitlensConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded config from {}", path.display());
            config
        }
        None => RitlensConfig::default(),
    };

    // Apply env var overrides
    if let Ok(cap) = std::env::var("RITLENS_ROW_CAP") {
        config.analytics.row_cap = cap
            .trim()
            .parse()
            .with_context(|| format!("RITLENS_ROW_CAP must be a positive integer, got \"{cap}\""))?;
    }
    if let Ok(dir) = std::env::var("RITLENS_STORE_DIR") {
        config.store_dir = PathBuf::from(dir);
    }

    config.store_dir = resolve_path(&config.store_dir);
    config.norms_path = config.norms_path.as_deref().map(resolve_path);

    if config.analytics.row_cap == 0 {
        anyhow::bail!("analytics.row_cap must be greater than zero");
    }
    if config.analytics.parallelism == 0 {
        config.analytics.parallelism = 1;
    }

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("ritlens"))
}

/// Build an engine over the JSON store at `store_dir` (or the configured one).
pub fn create_engine(config: &RitlensConfig, store_dir: Option<&Path>) -> Result<AnalyticsEngine> {
    let dir = store_dir.unwrap_or(&config.store_dir);
    let source = Arc::new(JsonStoreSource::new(dir));
    let thresholds = config
        .benchmark_thresholds()
        .context("invalid [thresholds] in config")?;
    Ok(AnalyticsEngine::new(
        source,
        config.norm_table()?,
        thresholds,
        config.engine_config(),
    ))
}
