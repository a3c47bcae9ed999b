//! Pluggable embedding providers for semantic scoring.
//!
//! The coherence and factuality scorers measure similarity in embedding
//! space. Two implementations are provided: a deterministic local
//! hashed-term-frequency embedder (always available, no I/O) and a remote
//! embedder that talks to an OpenAI-compatible `/v1/embeddings` endpoint.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

/// Trait for embedding providers.
///
/// Unlike generation, embedding is synchronous from the caller's point of
/// view; remote implementations bridge onto the async runtime internally.
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Generate embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;
}

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Returns 0.0 for mismatched lengths or zero-norm inputs, so degenerate
/// texts read as "no similarity" rather than poisoning a mean.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Local hashed term-frequency embedder (always available, no I/O).
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

fn term_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

impl Embedder for LocalEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Ok(vector);
        }

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in &words {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = term_hash(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        // L2 normalize
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

#[derive(Serialize)]
struct EmbeddingRequestBody<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Embedder backed by an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct RemoteEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dims: usize,
}

impl RemoteEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            dims: config.dimensions,
        }
    }

    /// Bridge the sync trait onto the async runtime without blocking it.
    fn embed_sync(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| EmbeddingError::Unavailable {
            message: "no tokio runtime available for remote embedding".into(),
        })?;

        std::thread::scope(|s| {
            s.spawn(|| handle.block_on(self.embed_api_call(texts)))
                .join()
                .map_err(|_| EmbeddingError::Request {
                    message: "embedding worker thread panicked".into(),
                })?
        })
    }

    async fn embed_api_call(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = EmbeddingRequestBody {
            model: &self.model,
            input: texts,
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| EmbeddingError::Request {
            message: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(EmbeddingError::Request {
                message: format!("embedding endpoint returned {}", response.status()),
            });
        }

        let parsed: EmbeddingResponseBody =
            response.json().await.map_err(|e| EmbeddingError::Request {
                message: format!("malformed embedding response: {e}"),
            })?;

        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Request {
                message: format!(
                    "embedding endpoint returned {} vectors for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
            });
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl Embedder for RemoteEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_sync(&[text])?;
        vectors.pop().ok_or_else(|| EmbeddingError::Request {
            message: "embedding endpoint returned no vectors".into(),
        })
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_sync(texts)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "remote"
    }
}

/// Factory function to create an embedder based on configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    match config.provider.as_str() {
        "remote" => Box::new(RemoteEmbedder::new(config)),
        "local" => Box::new(LocalEmbedder::new(config.dimensions)),
        other => {
            warn!(provider = other, "unknown embedding provider, using local");
            Box::new(LocalEmbedder::new(config.dimensions))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_embedder_dimensions() {
        let embedder = LocalEmbedder::new(128);
        assert_eq!(embedder.dimensions(), 128);
        let v = embedder.embed("hello world").unwrap();
        assert_eq!(v.len(), 128);
    }

    #[test]
    fn test_local_embedder_normalized() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed("test input text for normalization").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "expected normalized vector, got norm={}",
            norm
        );
    }

    #[test]
    fn test_local_embedder_empty_text() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed("").unwrap();
        assert_eq!(v.len(), 128);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_local_embedder_deterministic() {
        let embedder = LocalEmbedder::new(128);
        let v1 = embedder.embed("same text").unwrap();
        let v2 = embedder.embed("same text").unwrap();
        assert_eq!(v1, v2);
    }

    #[test]
    fn test_embed_batch_default() {
        let embedder = LocalEmbedder::new(64);
        let embeddings = embedder.embed_batch(&["hello", "world", "test"]).unwrap();
        assert_eq!(embeddings.len(), 3);
        for emb in &embeddings {
            assert_eq!(emb.len(), 64);
        }
    }

    #[test]
    fn test_cosine_identical_is_one() {
        let embedder = LocalEmbedder::new(128);
        let v = embedder.embed("the quick brown fox").unwrap();
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6, "got {sim}");
    }

    #[test]
    fn test_cosine_related_beats_unrelated() {
        let embedder = LocalEmbedder::new(256);
        let a = embedder.embed("rust is a systems programming language").unwrap();
        let b = embedder.embed("rust is a programming language for systems").unwrap();
        let c = embedder.embed("quantum entanglement of photon pairs").unwrap();
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_create_embedder_local() {
        let config = EmbeddingConfig::default();
        let embedder = create_embedder(&config);
        assert_eq!(embedder.provider_name(), "local");
        assert_eq!(embedder.dimensions(), 384);
    }

    #[test]
    fn test_create_embedder_unknown_falls_back() {
        let config = EmbeddingConfig {
            provider: "fastembed".into(),
            ..Default::default()
        };
        let embedder = create_embedder(&config);
        assert_eq!(embedder.provider_name(), "local");
    }
}
