//! Coherence scorer: semantic continuity between adjacent sentences.

use std::sync::Arc;

use crate::embeddings::{Embedder, cosine_similarity};
use crate::error::ScorerError;
use crate::scoring::{MetricScorer, ScoringContext, split_sentences};

/// Scores how well consecutive sentences hang together in embedding space.
///
/// The text is split into sentences, each sentence is embedded, and the
/// mean cosine similarity of adjacent pairs is mapped from [-1, 1] onto
/// [0, 100]. A single-sentence response is trivially coherent and scores
/// 100.
pub struct CoherenceScorer {
    embedder: Arc<dyn Embedder>,
}

impl CoherenceScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

impl MetricScorer for CoherenceScorer {
    fn name(&self) -> &'static str {
        "coherence"
    }

    fn score(&self, text: &str, _ctx: &ScoringContext<'_>) -> Result<f64, ScorerError> {
        let sentences = split_sentences(text);
        if sentences.len() <= 1 {
            return Ok(100.0);
        }

        let embeddings = self.embedder.embed_batch(&sentences)?;

        let mut total = 0.0;
        let mut pairs = 0usize;
        for window in embeddings.windows(2) {
            total += cosine_similarity(&window[0], &window[1]);
            pairs += 1;
        }
        let mean = total / pairs as f64;
        Ok(((mean + 1.0) / 2.0 * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use std::collections::BTreeMap;

    fn ctx<'a>(context: &'a BTreeMap<String, String>) -> ScoringContext<'a> {
        ScoringContext {
            prompt: "",
            context,
        }
    }

    fn scorer() -> CoherenceScorer {
        CoherenceScorer::new(Arc::new(LocalEmbedder::new(256)))
    }

    #[test]
    fn test_single_sentence_scores_100() {
        let context = BTreeMap::new();
        let score = scorer().score("Just one sentence here.", &ctx(&context)).unwrap();
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_empty_text_scores_100() {
        let context = BTreeMap::new();
        let score = scorer().score("", &ctx(&context)).unwrap();
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_repeated_sentence_is_maximally_coherent() {
        let context = BTreeMap::new();
        let score = scorer()
            .score(
                "The cat sat on the mat. The cat sat on the mat. The cat sat on the mat.",
                &ctx(&context),
            )
            .unwrap();
        assert!(score > 99.0, "got {score}");
    }

    #[test]
    fn test_topical_text_beats_disjoint_text() {
        let context = BTreeMap::new();
        let s = scorer();
        let topical = s
            .score(
                "Rust guarantees memory safety. Rust achieves memory safety through ownership. \
                 Ownership rules are checked by the Rust compiler.",
                &ctx(&context),
            )
            .unwrap();
        let disjoint = s
            .score(
                "Rust guarantees memory safety. Bananas ripen faster in paper bags. \
                 The tide tables for Lisbon changed.",
                &ctx(&context),
            )
            .unwrap();
        assert!(topical > disjoint, "topical={topical} disjoint={disjoint}");
    }
}
