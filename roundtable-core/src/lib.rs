//! # Round Table Core
//!
//! Multi-provider response competition engine. Fans one task out to
//! several text-generation providers concurrently, scores each candidate
//! along multiple quality dimensions, runs a statistical A/B comparison
//! between the two strongest candidates, and feeds every outcome into an
//! adaptive learning model that profiles provider strengths over time.

pub mod competition;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod learning;
pub mod metrics;
pub mod persistence;
pub mod providers;
pub mod ranking;
pub mod scoring;
pub mod stats;
pub mod types;

// Re-export commonly used types at the crate root.
pub use competition::RoundTable;
pub use config::{
    CompetitionConfig, EmbeddingConfig, LearningConfig, RoundTableConfig, ScoringConfig,
    StatsConfig,
};
pub use embeddings::{Embedder, LocalEmbedder, RemoteEmbedder, create_embedder};
pub use error::{
    CompetitionError, ConfigError, EmbeddingError, ProviderError, Result, RoundTableError,
    ScorerError, SinkError, StatsError,
};
pub use learning::{
    AdaptiveLearningEngine, Observation, ProviderProfile, RecommendationResult, Trend,
};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use persistence::{MemorySink, NoOpSink, OutcomeSink};
pub use providers::{
    Generation, GenerationProvider, MockProvider, OpenAiCompatConfig, OpenAiCompatProvider,
};
pub use scoring::{MetricScorer, ScoringContext, ScoringEngine};
pub use types::{
    AbTestResult, CandidateResponse, CompetitionOutcome, CompetitionRequest, CompetitionResult,
    ProviderFailure, ScoreVector, ScoredCandidate, ToolCall,
};
