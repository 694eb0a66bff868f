use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::debug;

use switchyard_core::config::EmbeddingConfig;
use switchyard_core::error::{Result, SwitchyardError};

/// Trait for embedding providers (OpenAI-compatible APIs).
pub trait EmbeddingProvider: Send + Sync + 'static {
    /// Embed a batch of texts into vectors, one per input, in input order.
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>>;
    /// Number of dimensions in the embedding vectors.
    fn dimensions(&self) -> usize;
}

/// HTTP-based embedding provider compatible with OpenAI, Ollama, etc.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str, dims: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(String::from),
            model: model.to_string(),
            dims,
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(
            config.resolved_base_url(),
            config.api_key.as_deref(),
            &config.model,
            config.dimensions,
        )
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed(&self, texts: &[String]) -> BoxFuture<'_, Result<Vec<Vec<f32>>>> {
        let texts = texts.to_vec();
        Box::pin(async move {
            let url = format!("{}/embeddings", self.base_url);

            let mut req = self.client.post(&url).json(&EmbeddingRequest {
                model: self.model.clone(),
                input: texts,
                dimensions: self.dims,
            });

            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let resp = req
                .send()
                .await
                .map_err(|e| SwitchyardError::Embedding(format!("request failed: {}", e)))?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(SwitchyardError::Embedding(format!(
                    "API error {}: {}",
                    status, body
                )));
            }

            let body: EmbeddingResponse = resp.json().await.map_err(|e| {
                SwitchyardError::Embedding(format!("failed to parse response: {}", e))
            })?;

            Ok(body.data.into_iter().map(|d| d.embedding).collect())
        })
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Embedding front-end that caches vectors by exact input text.
///
/// Batch calls only send the uncached texts to the provider.
pub struct CachedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Vec<f32>)>>,
}

impl CachedEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SwitchyardError::Embedding("provider returned no vectors".into()))
    }

    /// Embed many texts, reusing cached vectors where possible.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut results: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut missing: Vec<usize> = Vec::new();

        {
            let mut entries = self.lock()?;
            let now = Instant::now();
            entries.retain(|_, (at, _)| now.duration_since(*at) < self.ttl);
            for (i, text) in texts.iter().enumerate() {
                match entries.get(text) {
                    Some((_, v)) => results[i] = Some(v.clone()),
                    None => missing.push(i),
                }
            }
        }

        if !missing.is_empty() {
            let uncached: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            debug!(count = uncached.len(), cached = texts.len() - uncached.len(), "Embedding texts");
            let vectors = self.provider.embed(&uncached).await?;

            if vectors.len() != uncached.len() {
                return Err(SwitchyardError::Embedding(format!(
                    "expected {} vectors, provider returned {}",
                    uncached.len(),
                    vectors.len()
                )));
            }
            let dims = self.provider.dimensions();
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(SwitchyardError::Embedding(format!(
                    "expected {} dimensions, got {}",
                    dims,
                    bad.len()
                )));
            }

            let mut entries = self.lock()?;
            let now = Instant::now();
            for (&i, vector) in missing.iter().zip(vectors) {
                entries.insert(texts[i].clone(), (now, vector.clone()));
                results[i] = Some(vector);
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, (Instant, Vec<f32>)>>> {
        self.entries
            .lock()
            .map_err(|e| SwitchyardError::Embedding(e.to_string()))
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
