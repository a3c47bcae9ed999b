//! Factuality scorer: claim support against the supplied context.

use std::sync::Arc;

use crate::embeddings::{Embedder, cosine_similarity};
use crate::error::ScorerError;
use crate::scoring::{MetricScorer, ScoringContext, split_sentences};

const COPULA_VERBS: &[&str] = &[
    "is", "are", "was", "were", "has", "have", "had", "contains",
];

/// Scores how many of a response's claims are supported by the request
/// context.
///
/// Claims are sentences that carry a copula or possessive verb and at
/// least five words; if no sentence qualifies, every sentence is treated
/// as a claim. A claim counts as supported when its embedding's cosine
/// similarity to the serialized-context embedding meets the support
/// threshold. With no context supplied there is nothing to falsify and
/// the score is 100.
pub struct FactualityScorer {
    embedder: Arc<dyn Embedder>,
    support_threshold: f64,
}

impl FactualityScorer {
    pub fn new(embedder: Arc<dyn Embedder>, support_threshold: f64) -> Self {
        Self {
            embedder,
            support_threshold,
        }
    }

    fn is_claim(sentence: &str) -> bool {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if words.len() < 5 {
            return false;
        }
        words.iter().any(|w| {
            let lowered = w.to_lowercase();
            let stripped = lowered.trim_matches(|c: char| !c.is_alphanumeric());
            COPULA_VERBS.contains(&stripped)
        })
    }
}

impl MetricScorer for FactualityScorer {
    fn name(&self) -> &'static str {
        "factuality"
    }

    fn score(&self, text: &str, ctx: &ScoringContext<'_>) -> Result<f64, ScorerError> {
        if ctx.context.is_empty() {
            return Ok(100.0);
        }

        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return Ok(100.0);
        }

        let mut claims: Vec<&str> = sentences
            .iter()
            .copied()
            .filter(|s| Self::is_claim(s))
            .collect();
        if claims.is_empty() {
            claims = sentences;
        }

        let context_text = ctx.serialized_context();
        let context_embedding = self.embedder.embed(&context_text)?;
        let claim_embeddings = self.embedder.embed_batch(&claims)?;

        let supported = claim_embeddings
            .iter()
            .filter(|e| cosine_similarity(e, &context_embedding) >= self.support_threshold)
            .count();

        Ok(100.0 * supported as f64 / claims.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use std::collections::BTreeMap;

    fn scorer() -> FactualityScorer {
        FactualityScorer::new(Arc::new(LocalEmbedder::new(256)), 0.7)
    }

    #[test]
    fn test_no_context_scores_100() {
        let context = BTreeMap::new();
        let ctx = ScoringContext {
            prompt: "",
            context: &context,
        };
        let score = scorer()
            .score("The moon is made of cheese and it is delicious.", &ctx)
            .unwrap();
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_empty_text_with_context_scores_100() {
        let mut context = BTreeMap::new();
        context.insert("facts".to_string(), "water boils at 100C".to_string());
        let ctx = ScoringContext {
            prompt: "",
            context: &context,
        };
        let score = scorer().score("", &ctx).unwrap();
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_claims_restating_context_are_supported() {
        let mut context = BTreeMap::new();
        context.insert(
            "facts".to_string(),
            "the rust borrow checker is part of the compiler".to_string(),
        );
        let ctx = ScoringContext {
            prompt: "",
            context: &context,
        };
        let score = scorer()
            .score("The rust borrow checker is part of the compiler.", &ctx)
            .unwrap();
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_unrelated_claims_are_unsupported() {
        let mut context = BTreeMap::new();
        context.insert(
            "facts".to_string(),
            "the rust borrow checker is part of the compiler".to_string(),
        );
        let ctx = ScoringContext {
            prompt: "",
            context: &context,
        };
        let score = scorer()
            .score("Giraffes are the tallest land animals alive today.", &ctx)
            .unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_claim_detection() {
        assert!(FactualityScorer::is_claim(
            "The ocean is very deep indeed"
        ));
        // Too short even with a copula.
        assert!(!FactualityScorer::is_claim("It is blue"));
        // Long but no copula verb.
        assert!(!FactualityScorer::is_claim(
            "Run quickly toward the nearest exit now"
        ));
    }
}
