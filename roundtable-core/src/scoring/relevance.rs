//! Relevance scorer: prompt/response keyword overlap.

use std::collections::HashSet;

use crate::error::ScorerError;
use crate::scoring::{MetricScorer, ScoringContext};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "and", "or", "but", "in", "on",
    "at", "to", "for", "of",
];

/// Scores how much of the prompt's content vocabulary the response covers.
///
/// Both texts are lowercased, split on whitespace, and stripped of stop
/// words; the score is the fraction of remaining prompt words that appear
/// in the response, scaled to [0, 100]. A prompt with no content words
/// gives a neutral 50.
pub struct RelevanceScorer;

impl RelevanceScorer {
    pub fn new() -> Self {
        Self
    }

    fn content_words(text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
            .collect()
    }
}

impl Default for RelevanceScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricScorer for RelevanceScorer {
    fn name(&self) -> &'static str {
        "relevance"
    }

    fn score(&self, text: &str, ctx: &ScoringContext<'_>) -> Result<f64, ScorerError> {
        let prompt_words = Self::content_words(ctx.prompt);
        if prompt_words.is_empty() {
            return Ok(50.0);
        }
        let content_words = Self::content_words(text);
        let overlap = prompt_words.intersection(&content_words).count();
        Ok((overlap as f64 / prompt_words.len() as f64 * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn score(text: &str, prompt: &str) -> f64 {
        let context = BTreeMap::new();
        let ctx = ScoringContext {
            prompt,
            context: &context,
        };
        RelevanceScorer::new().score(text, &ctx).unwrap()
    }

    #[test]
    fn test_full_overlap_scores_100() {
        assert_eq!(
            score("Rust ownership explained with borrowing rules.", "explain rust ownership borrowing"),
            75.0
        );
        assert_eq!(score("sorting algorithms compared", "sorting algorithms compared"), 100.0);
    }

    #[test]
    fn test_no_overlap_scores_zero() {
        assert_eq!(score("bananas ripen in paper bags", "quantum field theory"), 0.0);
    }

    #[test]
    fn test_stop_words_ignored() {
        // Prompt reduces to {weather} after stop-word removal.
        assert_eq!(score("the weather", "the weather of the in a"), 100.0);
    }

    #[test]
    fn test_empty_prompt_is_neutral() {
        assert_eq!(score("anything at all", ""), 50.0);
        assert_eq!(score("anything", "the a an of"), 50.0);
    }
}
