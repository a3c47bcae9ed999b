//! Deterministic ranking and finalist selection.

use std::cmp::Ordering;

use crate::types::ScoredCandidate;

/// Sort candidates into rank order and assign 1-based ranks.
///
/// Order: aggregate score descending, then latency ascending, then cost
/// ascending, then provider id lexicographically. The chain is total, so
/// identical inputs always rank identically.
pub fn rank_candidates(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.scores
            .aggregate_score
            .total_cmp(&a.scores.aggregate_score)
            .then_with(|| a.candidate.latency_ms.cmp(&b.candidate.latency_ms))
            .then_with(|| {
                a.candidate
                    .cost_usd
                    .partial_cmp(&b.candidate.cost_usd)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.candidate.provider_id.cmp(&b.candidate.provider_id))
    });
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.scores.rank = i + 1;
    }
}

/// The top two ranked candidates, when at least two exist.
pub fn finalists(candidates: &[ScoredCandidate]) -> Option<(&ScoredCandidate, &ScoredCandidate)> {
    match candidates {
        [first, second, ..] => Some((first, second)),
        _ => None,
    }
}
