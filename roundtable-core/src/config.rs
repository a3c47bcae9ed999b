//! Configuration for the Round Table engine.
//!
//! Layered loading: built-in defaults, then `roundtable.toml` if present,
//! then environment variables prefixed `ROUNDTABLE_` (nested keys separated
//! by `__`, e.g. `ROUNDTABLE_STATS__SIGNIFICANCE_LEVEL=0.01`).

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTableConfig {
    pub competition: CompetitionConfig,
    pub scoring: ScoringConfig,
    pub stats: StatsConfig,
    pub learning: LearningConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for RoundTableConfig {
    fn default() -> Self {
        Self {
            competition: CompetitionConfig::default(),
            scoring: ScoringConfig::default(),
            stats: StatsConfig::default(),
            learning: LearningConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl RoundTableConfig {
    /// Load configuration from defaults, `roundtable.toml`, and environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("roundtable.toml")
    }

    /// Load configuration with an explicit TOML path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ROUNDTABLE_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Parse {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.competition.min_quorum == 0 {
            return Err(ConfigError::Invalid {
                message: "competition.min_quorum must be at least 1".into(),
            });
        }
        if self.competition.per_provider_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                message: "competition.per_provider_timeout_secs must be positive".into(),
            });
        }
        if self.competition.overall_deadline_secs < self.competition.per_provider_timeout_secs {
            return Err(ConfigError::Invalid {
                message: "competition.overall_deadline_secs must not be shorter than the per-provider timeout".into(),
            });
        }
        if !(0.0..1.0).contains(&self.stats.significance_level) || self.stats.significance_level <= 0.0 {
            return Err(ConfigError::Invalid {
                message: "stats.significance_level must be in (0, 1)".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.learning.ema_alpha) || self.learning.ema_alpha <= 0.0 {
            return Err(ConfigError::Invalid {
                message: "learning.ema_alpha must be in (0, 1]".into(),
            });
        }
        if self.scoring.weights.values().any(|w| *w < 0.0) {
            return Err(ConfigError::Invalid {
                message: "scoring.weights must be non-negative".into(),
            });
        }
        Ok(())
    }
}

/// Fan-out and quorum settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitionConfig {
    /// Timeout applied to each provider call, in seconds.
    pub per_provider_timeout_secs: u64,
    /// Deadline for the whole generation phase, in seconds.
    pub overall_deadline_secs: u64,
    /// Minimum successful candidates required to proceed to scoring.
    pub min_quorum: usize,
    /// Maximum number of competition outcomes kept in memory.
    pub history_capacity: usize,
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            per_provider_timeout_secs: 30,
            overall_deadline_secs: 120,
            min_quorum: 2,
            history_capacity: 1000,
        }
    }
}

/// Metric weights and confidence thresholds for the scoring engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Metric name → weight used in the aggregate. Unknown metrics fall
    /// back to a weight of 0.1.
    pub weights: BTreeMap<String, f64>,
    /// Minimum metrics that must succeed before a vector counts as
    /// full-confidence.
    pub min_metrics_for_confidence: usize,
    /// Cosine-similarity threshold for a claim to count as supported by
    /// the provided context.
    pub support_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert("coherence".to_string(), 0.25);
        weights.insert("factuality".to_string(), 0.25);
        weights.insert("hallucination_risk".to_string(), 0.20);
        weights.insert("safety".to_string(), 0.15);
        weights.insert("relevance".to_string(), 0.15);
        Self {
            weights,
            min_metrics_for_confidence: 3,
            support_threshold: 0.7,
        }
    }
}

/// Statistical comparison settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Two-tailed significance threshold for declaring a winner.
    pub significance_level: f64,
    /// Minimum samples per side before the comparison runs.
    pub min_samples: usize,
    /// Draw count for the Monte Carlo P(B > A) estimate.
    pub monte_carlo_draws: usize,
    /// Optional RNG seed for reproducible Monte Carlo estimates.
    pub seed: Option<u64>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            significance_level: 0.05,
            min_samples: 3,
            monte_carlo_draws: 10_000,
            seed: None,
        }
    }
}

/// Adaptive learning engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Smoothing factor for exponential moving averages.
    pub ema_alpha: f64,
    /// Trend detection window, in days.
    pub lookback_days: i64,
    /// Minimum observations inside the window before a trend is reported.
    pub min_competitions_for_trend: usize,
    /// Maximum observations retained for trend detection.
    pub history_capacity: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.1,
            lookback_days: 30,
            min_competitions_for_trend: 10,
            history_capacity: 1000,
        }
    }
}

/// Embedder selection and connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local` for the deterministic hashed embedder, `remote` for an
    /// OpenAI-compatible embeddings endpoint.
    pub provider: String,
    /// Base URL for the remote embedder.
    pub base_url: String,
    /// Model name for the remote embedder.
    pub model: String,
    /// API key for the remote embedder; usually injected via
    /// `ROUNDTABLE_EMBEDDING__API_KEY`.
    pub api_key: Option<String>,
    /// Output dimensionality for the local embedder.
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            api_key: None,
            dimensions: 384,
        }
    }
}
