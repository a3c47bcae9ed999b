//! Error types for the Round Table engine.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering competition orchestration, scoring, statistics, provider
//! adapters, embeddings, and configuration.

use crate::types::ProviderFailure;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RoundTableError>;

/// Top-level error type for the Round Table core library.
#[derive(Debug, thiserror::Error)]
pub enum RoundTableError {
    #[error("Competition error: {0}")]
    Competition(#[from] CompetitionError),

    #[error("Scoring error: {0}")]
    Scorer(#[from] ScorerError),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Outcome sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors that end a competition before a result can be produced.
#[derive(Debug, thiserror::Error)]
pub enum CompetitionError {
    /// Fewer providers succeeded than the request's quorum requires.
    /// Carries every per-provider failure so callers can see what went wrong.
    #[error("insufficient candidates: {got} succeeded, {need} required")]
    InsufficientCandidates {
        got: usize,
        need: usize,
        failures: Vec<ProviderFailure>,
    },

    /// The request invited no providers, or none of them are registered.
    #[error("no providers available for competition")]
    NoProviders,
}

/// Errors from generation provider adapters. Per-candidate and non-fatal:
/// the orchestrator records them as failures and continues up to quorum.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("generation request failed: {message}")]
    Generation { message: String },

    #[error("authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("response parse error: {message}")]
    ResponseParse { message: String },

    #[error("generation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("generation cancelled by competition deadline")]
    Cancelled,
}

/// Errors from an individual metric scorer. Non-fatal: the scoring engine
/// omits the failed metric and continues with the rest.
#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("scorer '{metric}' unavailable: {message}")]
    Unavailable { metric: String, message: String },

    #[error("scorer embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Errors from the statistical analyzer. Fatal to the comparison stage
/// only; the competition still reports a raw-score leader.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("insufficient samples for provider {provider}: {got} metrics present, {need} required")]
    InsufficientSamples {
        provider: String,
        got: usize,
        need: usize,
    },
}

/// Errors from embedding providers. Always recoverable from the scoring
/// engine's point of view.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("embedding request failed: {message}")]
    Request { message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error("configuration parse error: {message}")]
    Parse { message: String },
}

/// Errors from the outcome persistence collaborator. Logged by the
/// orchestrator, never propagated to `run` callers.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to record competition outcome: {message}")]
    Record { message: String },
}
