//! Competition orchestrator: the round table itself.
//!
//! Fans one request out to every invited provider concurrently, collects
//! candidates under per-provider timeouts and an overall deadline, scores
//! the survivors, ranks them, runs the finalist A/B comparison, and feeds
//! the outcome into the adaptive learning engine and the injected sinks.

use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CompetitionConfig, RoundTableConfig, StatsConfig};
use crate::error::{CompetitionError, ProviderError};
use crate::learning::{AdaptiveLearningEngine, ProviderProfile, RecommendationResult};
use crate::metrics::EngineMetrics;
use crate::persistence::{NoOpSink, OutcomeSink};
use crate::providers::GenerationProvider;
use crate::ranking::{finalists, rank_candidates};
use crate::scoring::{ScoringContext, ScoringEngine};
use crate::stats;
use crate::types::{
    AbTestResult, CandidateResponse, CompetitionOutcome, CompetitionRequest, CompetitionResult,
    ProviderFailure, ScoredCandidate,
};

/// The engine. Construct once, register providers, then call [`run`]
/// per task. All shared state is internally synchronized, so one instance
/// can serve concurrent competitions.
///
/// [`run`]: RoundTable::run
pub struct RoundTable {
    providers: HashMap<String, Arc<dyn GenerationProvider>>,
    scoring: Arc<ScoringEngine>,
    learning: Arc<AdaptiveLearningEngine>,
    sink: Arc<dyn OutcomeSink>,
    metrics: Arc<EngineMetrics>,
    competition_config: CompetitionConfig,
    stats_config: StatsConfig,
    history: Mutex<VecDeque<CompetitionOutcome>>,
}

impl RoundTable {
    pub fn new(
        scoring: ScoringEngine,
        learning: Arc<AdaptiveLearningEngine>,
        config: &RoundTableConfig,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            scoring: Arc::new(scoring),
            learning,
            sink: Arc::new(NoOpSink),
            metrics: Arc::new(EngineMetrics::new()),
            competition_config: config.competition.clone(),
            stats_config: config.stats.clone(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Wire a persistence sink; outcomes are handed to it after every
    /// completed competition.
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Register a provider under its own id. Re-registering an id replaces
    /// the previous provider.
    pub fn register_provider(&mut self, provider: Arc<dyn GenerationProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run one competition end to end.
    pub async fn run(
        &self,
        request: CompetitionRequest,
    ) -> Result<CompetitionResult, CompetitionError> {
        if request.providers.is_empty() {
            return Err(CompetitionError::NoProviders);
        }
        self.metrics.record_started();
        let started = Instant::now();
        info!(
            request_id = %request.id,
            providers = request.providers.len(),
            category = request.task_category.as_deref().unwrap_or("-"),
            "competition started"
        );

        let (candidates, failures) = self.generate_candidates(&request).await;

        if candidates.len() < request.min_quorum {
            warn!(
                request_id = %request.id,
                got = candidates.len(),
                need = request.min_quorum,
                "quorum not reached, aborting competition"
            );
            self.metrics.record_aborted();
            return Err(CompetitionError::InsufficientCandidates {
                got: candidates.len(),
                need: request.min_quorum,
                failures,
            });
        }

        // Candidates have no ordering dependency, so scoring fans out on
        // blocking threads; this also keeps remote embedder calls off the
        // runtime workers.
        let mut scored = self.score_candidates(&request, candidates).await;
        rank_candidates(&mut scored);

        let (ab_test, winner, unconfirmed) = self.compare_finalists(&request, &scored);

        // Feed the learning engine; its failures never surface.
        for entry in &scored {
            let won = winner.as_deref() == Some(entry.candidate.provider_id.as_str());
            self.learning.update(
                &entry.candidate.provider_id,
                won,
                entry.scores.aggregate_score,
                entry.candidate.latency_ms as f64,
                entry.candidate.cost_usd,
                request.task_category.as_deref(),
            );
            if won {
                self.metrics.record_win(&entry.candidate.provider_id);
            } else {
                self.metrics.record_loss(&entry.candidate.provider_id);
            }
        }

        let total_cost_usd = scored.iter().map(|s| s.candidate.cost_usd).sum::<f64>();

        let outcome = CompetitionOutcome {
            request_id: request.id,
            score_vectors: scored.iter().map(|s| s.scores.clone()).collect(),
            ab_test: ab_test.clone(),
            winner: winner.clone(),
            completed_at: chrono::Utc::now(),
        };
        self.remember(outcome.clone());
        if let Err(e) = self.sink.record(&outcome).await {
            warn!(request_id = %request.id, error = %e, "outcome sink rejected record");
        }

        self.metrics.record_completed();
        let total_duration_ms = started.elapsed().as_millis() as u64;
        info!(
            request_id = %request.id,
            winner = winner.as_deref().unwrap_or("-"),
            unconfirmed,
            duration_ms = total_duration_ms,
            "competition completed"
        );

        Ok(CompetitionResult {
            request_id: request.id,
            scored,
            failures,
            ab_test,
            winner,
            unconfirmed,
            total_duration_ms,
            total_cost_usd,
        })
    }

    /// Fan the prompt out to every invited provider. Each unit owns its
    /// result slot; failures are recorded, never dropped.
    async fn generate_candidates(
        &self,
        request: &CompetitionRequest,
    ) -> (Vec<CandidateResponse>, Vec<ProviderFailure>) {
        let mut failures = Vec::new();

        let mut invited = Vec::new();
        for id in &request.providers {
            match self.providers.get(id) {
                Some(provider) => invited.push(Arc::clone(provider)),
                None => failures.push(ProviderFailure {
                    provider_id: id.clone(),
                    reason: "provider not registered".to_string(),
                    timed_out: false,
                }),
            }
        }

        let deadline = CancellationToken::new();
        let deadline_guard = deadline.clone();
        let overall = request.overall_deadline;
        let deadline_task = tokio::spawn(async move {
            tokio::time::sleep(overall).await;
            deadline_guard.cancel();
        });

        let futures: Vec<_> = invited
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let prompt = request.prompt.clone();
                let context = request.context.clone();
                let per_provider = request.per_provider_timeout;
                let token = deadline.clone();

                async move {
                    let start = Instant::now();
                    let outcome = tokio::select! {
                        _ = token.cancelled() => Err(ProviderError::Cancelled),
                        result = tokio::time::timeout(
                            per_provider,
                            provider.generate(&prompt, &context),
                        ) => match result {
                            Ok(inner) => inner,
                            Err(_) => Err(ProviderError::Timeout {
                                timeout_secs: per_provider.as_secs(),
                            }),
                        },
                    };
                    let latency_ms = start.elapsed().as_millis() as u64;

                    match outcome {
                        Ok(generation) => Ok(CandidateResponse {
                            provider_id: provider.id().to_string(),
                            text: generation.text,
                            tool_calls: generation.tool_calls,
                            latency_ms,
                            cost_usd: generation.cost_usd,
                            error: None,
                        }),
                        Err(e) => {
                            warn!(
                                provider = provider.id(),
                                error = %e,
                                latency_ms,
                                "provider failed to produce a candidate"
                            );
                            let timed_out =
                                matches!(e, ProviderError::Timeout { .. } | ProviderError::Cancelled);
                            Err(ProviderFailure {
                                provider_id: provider.id().to_string(),
                                reason: e.to_string(),
                                timed_out,
                            })
                        }
                    }
                }
            })
            .collect();

        let results = join_all(futures).await;
        deadline_task.abort();

        let mut candidates = Vec::new();
        for result in results {
            match result {
                Ok(candidate) => candidates.push(candidate),
                Err(failure) => failures.push(failure),
            }
        }

        debug!(
            request_id = %request.id,
            candidates = candidates.len(),
            failures = failures.len(),
            "generation phase finished"
        );
        (candidates, failures)
    }

    async fn score_candidates(
        &self,
        request: &CompetitionRequest,
        candidates: Vec<CandidateResponse>,
    ) -> Vec<ScoredCandidate> {
        let tasks: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let scoring = Arc::clone(&self.scoring);
                let prompt = request.prompt.clone();
                let context = request.context.clone();
                tokio::task::spawn_blocking(move || {
                    let ctx = ScoringContext {
                        prompt: &prompt,
                        context: &context,
                    };
                    let scores = scoring.score(&candidate, &ctx);
                    ScoredCandidate { candidate, scores }
                })
            })
            .collect();

        let mut scored = Vec::with_capacity(tasks.len());
        for task in join_all(tasks).await {
            match task {
                Ok(entry) => scored.push(entry),
                Err(e) => warn!(error = %e, "scoring task failed"),
            }
        }
        scored
    }

    /// Run the finalist comparison. Returns the A/B result when it could
    /// run, the winner, and whether the winner is statistically
    /// unconfirmed.
    fn compare_finalists(
        &self,
        request: &CompetitionRequest,
        scored: &[ScoredCandidate],
    ) -> (Option<AbTestResult>, Option<String>, bool) {
        let raw_leader = scored.first().map(|s| s.candidate.provider_id.clone());

        let Some((first, second)) = finalists(scored) else {
            debug!(request_id = %request.id, "fewer than two finalists, skipping comparison");
            return (None, raw_leader, true);
        };

        let stats_started = Instant::now();
        let comparison = stats::compare(&first.scores, &second.scores, &self.stats_config);
        self.metrics
            .record_stats_duration_ms(stats_started.elapsed().as_secs_f64() * 1000.0);

        match comparison {
            Ok(ab) => {
                // A non-significant test is still a completed comparison;
                // only a comparison that could not run leaves the winner
                // unconfirmed.
                let winner = ab.winner.clone().or(raw_leader);
                (Some(ab), winner, false)
            }
            Err(e) => {
                warn!(
                    request_id = %request.id,
                    error = %e,
                    "finalist comparison unavailable, reporting raw leader"
                );
                (None, raw_leader, true)
            }
        }
    }

    fn remember(&self, outcome: CompetitionOutcome) {
        let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.push_back(outcome);
        while history.len() > self.competition_config.history_capacity {
            history.pop_front();
        }
    }

    /// Recent competition outcomes, oldest first, bounded by
    /// `competition.history_capacity`.
    pub fn history(&self) -> Vec<CompetitionOutcome> {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.iter().cloned().collect()
    }

    /// Ask the learning engine which providers to invite next.
    pub fn recommend(
        &self,
        category: Option<&str>,
        max_providers: usize,
        prefer_fast: bool,
        prefer_cheap: bool,
    ) -> RecommendationResult {
        self.learning
            .recommend(category, max_providers, prefer_fast, prefer_cheap)
    }

    pub fn get_profile(&self, provider_id: &str) -> Option<ProviderProfile> {
        self.learning.get_profile(provider_id)
    }

    pub fn leaderboard(&self, top_n: usize) -> Vec<ProviderProfile> {
        self.learning.leaderboard(top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LearningConfig, ScoringConfig};
    use crate::embeddings::LocalEmbedder;
    use crate::persistence::MemorySink;
    use crate::providers::MockProvider;
    use std::time::Duration;

    fn engine() -> RoundTable {
        let config = RoundTableConfig::default();
        let scoring = ScoringEngine::with_default_scorers(
            Arc::new(LocalEmbedder::new(128)),
            &ScoringConfig::default(),
        );
        let learning = Arc::new(AdaptiveLearningEngine::new(LearningConfig::default()));
        RoundTable::new(scoring, learning, &config)
    }

    fn request(providers: &[&str]) -> CompetitionRequest {
        CompetitionRequest::new(
            "explain how rust ownership works",
            providers.iter().map(|p| p.to_string()).collect(),
        )
        .with_timeouts(Duration::from_millis(200), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_competition_with_two_providers() {
        let mut table = engine();
        table.register_provider(Arc::new(MockProvider::new("alpha").with_response(
            "Rust ownership moves values between bindings. Borrowing lends access without moving. \
             The compiler checks every borrow at compile time.",
        )));
        table.register_provider(Arc::new(
            MockProvider::new("beta").with_response("ok"),
        ));

        let result = table.run(request(&["alpha", "beta"])).await.unwrap();
        assert_eq!(result.scored.len(), 2);
        assert!(result.failures.is_empty());
        assert!(result.winner.is_some());
        assert_eq!(result.scored[0].scores.rank, 1);
        assert_eq!(result.scored[1].scores.rank, 2);
        assert!(result.ab_test.is_some());
    }

    #[tokio::test]
    async fn test_quorum_failure_lists_failures() {
        let mut table = engine();
        table.register_provider(Arc::new(
            MockProvider::new("good").with_response("a fine answer"),
        ));
        table.register_provider(Arc::new(MockProvider::failing("down", "connection refused")));

        let err = table
            .run(request(&["good", "down", "missing"]))
            .await
            .unwrap_err();
        match err {
            CompetitionError::InsufficientCandidates { got, need, failures } => {
                assert_eq!(got, 1);
                assert_eq!(need, 2);
                assert_eq!(failures.len(), 2);
                let ids: Vec<&str> =
                    failures.iter().map(|f| f.provider_id.as_str()).collect();
                assert!(ids.contains(&"down"));
                assert!(ids.contains(&"missing"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(table.metrics().snapshot().competitions_aborted, 1);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out_but_competition_continues() {
        let mut table = engine();
        table.register_provider(Arc::new(
            MockProvider::new("fast-a").with_response("quick answer one"),
        ));
        table.register_provider(Arc::new(
            MockProvider::new("fast-b").with_response("quick answer two"),
        ));
        table.register_provider(Arc::new(
            MockProvider::new("slow")
                .with_response("too late")
                .with_delay(Duration::from_secs(5)),
        ));

        let result = table
            .run(request(&["fast-a", "fast-b", "slow"]))
            .await
            .unwrap();
        assert_eq!(result.scored.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].provider_id, "slow");
        assert!(result.failures[0].timed_out);
    }

    #[tokio::test]
    async fn test_single_candidate_is_unconfirmed_winner() {
        let mut table = engine();
        table.register_provider(Arc::new(
            MockProvider::new("solo").with_response("the only answer"),
        ));

        let result = table
            .run(request(&["solo"]).with_min_quorum(1))
            .await
            .unwrap();
        assert_eq!(result.winner.as_deref(), Some("solo"));
        assert!(result.unconfirmed);
        assert!(result.ab_test.is_none());
    }

    #[tokio::test]
    async fn test_outcome_reaches_sink_and_learning() {
        let sink = Arc::new(MemorySink::new(10));
        let mut table = engine().with_sink(Arc::clone(&sink) as Arc<dyn OutcomeSink>);
        table.register_provider(Arc::new(
            MockProvider::new("alpha").with_response("first answer about ownership"),
        ));
        table.register_provider(Arc::new(
            MockProvider::new("beta").with_response("second answer about ownership"),
        ));

        let req = request(&["alpha", "beta"]).with_category("teaching");
        let request_id = req.id;
        table.run(req).await.unwrap();

        let stored = sink.snapshot();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].request_id, request_id);
        assert_eq!(stored[0].score_vectors.len(), 2);

        let profile = table.get_profile("alpha").unwrap();
        assert_eq!(profile.total_competitions, 1);
        assert!(profile.category_performance.contains_key("teaching"));

        assert_eq!(table.history().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_invite_list_rejected() {
        let table = engine();
        let err = table.run(request(&[])).await.unwrap_err();
        assert!(matches!(err, CompetitionError::NoProviders));
    }

    #[tokio::test]
    async fn test_total_cost_accumulates() {
        let mut table = engine();
        table.register_provider(Arc::new(
            MockProvider::new("a").with_response("answer a").with_cost(0.01),
        ));
        table.register_provider(Arc::new(
            MockProvider::new("b").with_response("answer b").with_cost(0.02),
        ));
        let result = table.run(request(&["a", "b"])).await.unwrap();
        assert!((result.total_cost_usd - 0.03).abs() < 1e-12);
    }
}
