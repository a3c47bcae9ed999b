//! Multi-metric scoring pipeline.
//!
//! The engine runs every registered scorer against one candidate and folds
//! the results into a `ScoreVector`. Scorers fail independently: a metric
//! whose dependency is unavailable is omitted from the vector instead of
//! aborting the whole score, and the vector is flagged low-confidence when
//! too few metrics succeed.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ScoringConfig;
use crate::embeddings::Embedder;
use crate::error::ScorerError;
use crate::types::{CandidateResponse, ScoreVector};

mod coherence;
mod factuality;
mod hallucination;
mod relevance;
mod safety;

pub use coherence::CoherenceScorer;
pub use factuality::FactualityScorer;
pub use hallucination::HallucinationRiskScorer;
pub use relevance::RelevanceScorer;
pub use safety::SafetyScorer;

/// Weight applied to metrics missing from the configured weight table.
const FALLBACK_WEIGHT: f64 = 0.1;

/// Inputs shared by every scorer for one candidate.
pub struct ScoringContext<'a> {
    pub prompt: &'a str,
    pub context: &'a BTreeMap<String, String>,
}

impl ScoringContext<'_> {
    /// Flatten the context map into one text block for embedding.
    pub fn serialized_context(&self) -> String {
        self.context
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One quality dimension. Implementations must be pure given their inputs
/// and their (external) embedding provider.
pub trait MetricScorer: Send + Sync {
    /// Metric name used as the key in `ScoreVector.metrics`.
    fn name(&self) -> &'static str;

    /// Score the candidate text in [0, 100].
    fn score(&self, text: &str, ctx: &ScoringContext<'_>) -> Result<f64, ScorerError>;
}

/// Runs all registered scorers and assembles score vectors.
pub struct ScoringEngine {
    scorers: Vec<Box<dyn MetricScorer>>,
    weights: BTreeMap<String, f64>,
    min_metrics_for_confidence: usize,
}

impl ScoringEngine {
    pub fn new(scorers: Vec<Box<dyn MetricScorer>>, config: &ScoringConfig) -> Self {
        Self {
            scorers,
            weights: config.weights.clone(),
            min_metrics_for_confidence: config.min_metrics_for_confidence,
        }
    }

    /// Build the standard five-scorer pipeline.
    pub fn with_default_scorers(embedder: Arc<dyn Embedder>, config: &ScoringConfig) -> Self {
        let scorers: Vec<Box<dyn MetricScorer>> = vec![
            Box::new(CoherenceScorer::new(Arc::clone(&embedder))),
            Box::new(FactualityScorer::new(embedder, config.support_threshold)),
            Box::new(HallucinationRiskScorer::new()),
            Box::new(SafetyScorer::new()),
            Box::new(RelevanceScorer::new()),
        ];
        Self::new(scorers, config)
    }

    /// Score one candidate. Never fails: scorer errors degrade that metric.
    pub fn score(&self, candidate: &CandidateResponse, ctx: &ScoringContext<'_>) -> ScoreVector {
        let mut metrics = BTreeMap::new();
        for scorer in &self.scorers {
            match scorer.score(&candidate.text, ctx) {
                Ok(value) => {
                    let clamped = value.clamp(0.0, 100.0);
                    debug!(
                        provider = %candidate.provider_id,
                        metric = scorer.name(),
                        score = clamped,
                        "metric scored"
                    );
                    metrics.insert(scorer.name().to_string(), clamped);
                }
                Err(e) => {
                    warn!(
                        provider = %candidate.provider_id,
                        metric = scorer.name(),
                        error = %e,
                        "scorer unavailable, omitting metric"
                    );
                }
            }
        }

        let aggregate_score = self.aggregate(&metrics);
        let low_confidence = metrics.len() < self.min_metrics_for_confidence;

        ScoreVector {
            provider_id: candidate.provider_id.clone(),
            metrics,
            aggregate_score,
            low_confidence,
            rank: 0,
        }
    }

    /// Weighted mean over the metrics present, re-normalized to the subset
    /// of weights actually used so partial vectors keep the same scale.
    fn aggregate(&self, metrics: &BTreeMap<String, f64>) -> f64 {
        if metrics.is_empty() {
            return 0.0;
        }
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for (name, value) in metrics {
            let weight = self.weights.get(name).copied().unwrap_or(FALLBACK_WEIGHT);
            weighted_sum += weight * value;
            weight_total += weight;
        }
        if weight_total <= 0.0 {
            return 0.0;
        }
        (weighted_sum / weight_total).clamp(0.0, 100.0)
    }
}

/// Split text into sentences on terminal punctuation. Shared by the
/// coherence and factuality scorers.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    text.split_inclusive(['.', '!', '?'])
        .map(|s| s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '!' | '?')))
        .filter(|s| !s.is_empty())
        .collect()
}
