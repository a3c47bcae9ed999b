//! Integration tests for the full competition pipeline.
//!
//! These exercise the engine end-to-end using MockProvider: fan-out,
//! scoring, ranking, the finalist A/B comparison, outcome persistence, and
//! the learning feedback loop across repeated competitions.

use roundtable_core::config::{LearningConfig, RoundTableConfig, ScoringConfig};
use roundtable_core::embeddings::LocalEmbedder;
use roundtable_core::learning::{AdaptiveLearningEngine, Trend};
use roundtable_core::persistence::{MemorySink, OutcomeSink};
use roundtable_core::providers::MockProvider;
use roundtable_core::scoring::ScoringEngine;
use roundtable_core::types::CompetitionRequest;
use roundtable_core::RoundTable;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

const STRONG_ANSWER: &str =
    "Rust ownership assigns each value a single owner. Ownership moves when a value is assigned \
     to another binding. Borrowing lends access without transferring ownership. The compiler \
     verifies every borrow at compile time.";

const WEAK_ANSWER: &str =
    "It is definitely always the best language. Everyone knows this. Studies show it never fails.";

fn build_table(learning: Arc<AdaptiveLearningEngine>) -> RoundTable {
    let config = RoundTableConfig::default();
    let scoring = ScoringEngine::with_default_scorers(
        Arc::new(LocalEmbedder::new(256)),
        &ScoringConfig::default(),
    );
    RoundTable::new(scoring, learning, &config)
}

fn request(providers: &[&str]) -> CompetitionRequest {
    CompetitionRequest::new(
        "explain rust ownership and borrowing",
        providers.iter().map(|p| p.to_string()).collect(),
    )
    .with_timeouts(Duration::from_millis(500), Duration::from_secs(2))
    .with_category("teaching")
}

#[tokio::test]
async fn strong_answer_outranks_weak_answer() {
    init_tracing();
    let learning = Arc::new(AdaptiveLearningEngine::new(LearningConfig::default()));
    let mut table = build_table(learning);
    table.register_provider(Arc::new(
        MockProvider::new("strong").with_response(STRONG_ANSWER),
    ));
    table.register_provider(Arc::new(
        MockProvider::new("weak").with_response(WEAK_ANSWER),
    ));

    let result = table.run(request(&["strong", "weak"])).await.unwrap();

    assert_eq!(result.scored[0].candidate.provider_id, "strong");
    assert_eq!(result.scored[0].scores.rank, 1);
    assert!(
        result.scored[0].scores.aggregate_score > result.scored[1].scores.aggregate_score
    );
    let ab = result.ab_test.expect("two finalists should be compared");
    assert!((0.0..=1.0).contains(&ab.p_value));
    assert!((-1.0..=1.0).contains(&ab.cliffs_delta));
    for vector in [&result.scored[0].scores, &result.scored[1].scores] {
        assert!((0.0..=100.0).contains(&vector.aggregate_score));
        for value in vector.metrics.values() {
            assert!((0.0..=100.0).contains(value));
        }
    }
}

#[tokio::test]
async fn repeated_competitions_build_profiles_and_recommendations() {
    init_tracing();
    let learning = Arc::new(AdaptiveLearningEngine::new(LearningConfig::default()));
    let mut table = build_table(Arc::clone(&learning));
    table.register_provider(Arc::new(
        MockProvider::new("strong").with_response(STRONG_ANSWER),
    ));
    table.register_provider(Arc::new(
        MockProvider::new("weak").with_response(WEAK_ANSWER),
    ));

    for _ in 0..12 {
        table.run(request(&["strong", "weak"])).await.unwrap();
    }

    let strong = table.get_profile("strong").expect("profile exists");
    let weak = table.get_profile("weak").expect("profile exists");
    assert_eq!(strong.total_competitions, 12);
    assert!(
        (strong.win_rate - strong.wins as f64 / strong.total_competitions as f64).abs()
            < f64::EPSILON
    );
    assert!(strong.win_rate > weak.win_rate);
    // Scores were flat across runs, so the trend settles rather than swings.
    assert!(matches!(strong.trend, Trend::Stable | Trend::InsufficientData));

    let recommendation = table.recommend(Some("teaching"), 2, false, false);
    assert_eq!(recommendation.ranked_providers[0], "strong");
    assert!(recommendation.category_match);
    assert!((0.0..=1.0).contains(&recommendation.confidence));

    let board = table.leaderboard(5);
    assert_eq!(board[0].provider_id, "strong");

    let snapshot = table.metrics().snapshot();
    assert_eq!(snapshot.competitions_started, 12);
    assert_eq!(snapshot.competitions_completed, 12);
    assert_eq!(snapshot.stats_durations_ms.len(), 12);
}

#[tokio::test]
async fn outcomes_flow_to_the_injected_sink() {
    init_tracing();
    let learning = Arc::new(AdaptiveLearningEngine::new(LearningConfig::default()));
    let sink = Arc::new(MemorySink::new(100));
    let mut table = build_table(learning).with_sink(Arc::clone(&sink) as Arc<dyn OutcomeSink>);
    table.register_provider(Arc::new(
        MockProvider::new("strong").with_response(STRONG_ANSWER),
    ));
    table.register_provider(Arc::new(
        MockProvider::new("weak").with_response(WEAK_ANSWER),
    ));

    let req = request(&["strong", "weak"]);
    let id = req.id;
    table.run(req).await.unwrap();

    let outcomes = sink.snapshot();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].request_id, id);
    assert_eq!(outcomes[0].score_vectors.len(), 2);
    assert!(outcomes[0].ab_test.is_some());
    assert_eq!(table.history().len(), 1);
}

#[tokio::test]
async fn deadline_cancels_stragglers_and_records_them_as_failures() {
    init_tracing();
    let learning = Arc::new(AdaptiveLearningEngine::new(LearningConfig::default()));
    let mut table = build_table(learning);
    table.register_provider(Arc::new(
        MockProvider::new("prompt-a").with_response(STRONG_ANSWER),
    ));
    table.register_provider(Arc::new(
        MockProvider::new("prompt-b").with_response(WEAK_ANSWER),
    ));
    table.register_provider(Arc::new(
        MockProvider::new("straggler")
            .with_response("never arrives")
            .with_delay(Duration::from_secs(30)),
    ));

    let req = CompetitionRequest::new(
        "explain rust ownership",
        vec!["prompt-a".into(), "prompt-b".into(), "straggler".into()],
    )
    .with_timeouts(Duration::from_secs(10), Duration::from_millis(300));

    let result = table.run(req).await.unwrap();
    assert_eq!(result.scored.len(), 2);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].provider_id, "straggler");
    assert!(result.failures[0].timed_out);
}
