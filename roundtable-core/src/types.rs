//! Core type definitions for the Round Table engine.
//!
//! Defines the immutable data model that flows through a competition:
//! requests, candidate responses, score vectors, A/B test results, and the
//! outcome record emitted for persistence. Everything here is constructed
//! once and never mutated afterwards, except `ScoreVector::rank`, which is
//! assigned exactly once by the ranking stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// A single request to run a competition across several providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionRequest {
    /// Unique id for this competition.
    pub id: Uuid,
    /// The task prompt sent to every invited provider.
    pub prompt: String,
    /// Opaque key/value context forwarded to providers and scorers.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional task category tag, used by the adaptive learning engine.
    #[serde(default)]
    pub task_category: Option<String>,
    /// Ordered set of provider ids invited to compete.
    pub providers: Vec<String>,
    /// Timeout applied to each provider call individually.
    pub per_provider_timeout: Duration,
    /// Deadline for the whole generation phase; cancels stragglers.
    pub overall_deadline: Duration,
    /// Minimum number of successful candidates required to proceed.
    pub min_quorum: usize,
}

impl CompetitionRequest {
    /// Create a request with a fresh id and the given prompt and providers.
    pub fn new(prompt: impl Into<String>, providers: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            context: BTreeMap::new(),
            task_category: None,
            providers,
            per_provider_timeout: Duration::from_secs(30),
            overall_deadline: Duration::from_secs(120),
            min_quorum: 2,
        }
    }

    /// Attach a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Tag the request with a task category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.task_category = Some(category.into());
        self
    }

    /// Override the timeout and deadline settings.
    pub fn with_timeouts(mut self, per_provider: Duration, overall: Duration) -> Self {
        self.per_provider_timeout = per_provider;
        self.overall_deadline = overall;
        self
    }

    /// Override the quorum requirement.
    pub fn with_min_quorum(mut self, quorum: usize) -> Self {
        self.min_quorum = quorum;
        self
    }
}

/// A structured tool call emitted by a provider alongside its text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A single provider's response within one competition.
///
/// Produced exactly once per provider per competition. `error` is set when
/// generation failed, timed out, or was cancelled; success and failure are
/// never conflated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub provider_id: String,
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub latency_ms: u64,
    pub cost_usd: f64,
    #[serde(default)]
    pub error: Option<String>,
}

impl CandidateResponse {
    /// Whether generation succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Build a failed candidate carrying the error message.
    pub fn failure(provider_id: impl Into<String>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            text: String::new(),
            tool_calls: Vec::new(),
            latency_ms,
            cost_usd: 0.0,
            error: Some(error.into()),
        }
    }
}

/// Record of a provider that failed to produce a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub reason: String,
    /// Whether the failure was a timeout or deadline cancellation.
    pub timed_out: bool,
}

/// Per-metric quality scores for one candidate.
///
/// Invariant: every metric value and the aggregate are finite and within
/// [0, 100]. The aggregate is the weighted sum over the metrics actually
/// present, re-normalized to the subset of weights used, so a partially
/// scored vector stays on the same scale as a complete one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreVector {
    pub provider_id: String,
    /// Metric name → score in [0, 100]. Ordered for deterministic iteration.
    pub metrics: BTreeMap<String, f64>,
    pub aggregate_score: f64,
    /// Set when fewer metrics succeeded than the configured minimum.
    pub low_confidence: bool,
    /// 1-based rank assigned by the ranking stage; 0 until ranked.
    #[serde(default)]
    pub rank: usize,
}

impl ScoreVector {
    /// Metric values in deterministic (metric-name) order. These form the
    /// sample array used by the statistical analyzer.
    pub fn sample_values(&self) -> Vec<f64> {
        self.metrics.values().copied().collect()
    }
}

/// A candidate paired with its score vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: CandidateResponse,
    pub scores: ScoreVector,
}

/// Result of the statistical A/B comparison between the two finalists.
///
/// The sample arrays are the finalists' per-metric scores treated as paired
/// observational samples, not repeated task trials. `winner` is non-null
/// only when `is_significant` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbTestResult {
    pub provider_a: String,
    pub provider_b: String,
    pub scores_a: Vec<f64>,
    pub scores_b: Vec<f64>,
    pub mean_a: f64,
    pub mean_b: f64,
    /// Two-tailed Welch's t-test p-value, in [0, 1].
    pub p_value: f64,
    /// 95% confidence interval for each mean (degenerate when n < 2).
    pub ci_a: (f64, f64),
    pub ci_b: (f64, f64),
    /// Standardized mean difference (B − A over pooled SD).
    pub cohens_d: f64,
    /// Rank-based effect size in [-1, 1]; +1 means every B sample beats every A sample.
    pub cliffs_delta: f64,
    /// Monte Carlo estimate of P(B > A) from point-estimated normals.
    pub bayesian_prob_b_beats_a: f64,
    pub winner: Option<String>,
    pub is_significant: bool,
}

/// Complete result of one competition, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionResult {
    pub request_id: Uuid,
    /// Successful candidates with their scores, in rank order.
    pub scored: Vec<ScoredCandidate>,
    /// Providers that failed to produce a candidate (non-fatal, logged).
    pub failures: Vec<ProviderFailure>,
    /// Statistical comparison of the two finalists, when it could run.
    pub ab_test: Option<AbTestResult>,
    /// The winning provider: the A/B winner when significant, otherwise the
    /// raw-score leader.
    pub winner: Option<String>,
    /// Set when the winner was not statistically confirmed (fewer than two
    /// finalists, or the comparison stage failed on sample count).
    pub unconfirmed: bool,
    pub total_duration_ms: u64,
    pub total_cost_usd: f64,
}

/// The record emitted to the persistence collaborator after every
/// completed competition. The engine holds no database connection; durable
/// storage of these records is an external concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionOutcome {
    pub request_id: Uuid,
    pub score_vectors: Vec<ScoreVector>,
    pub ab_test: Option<AbTestResult>,
    pub winner: Option<String>,
    pub completed_at: DateTime<Utc>,
}
