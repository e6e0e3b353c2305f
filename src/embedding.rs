//! Embedding client abstraction and the hosted Gemini implementation.
//!
//! Defines the [`EmbeddingClient`] trait and [`GeminiEmbedder`], which calls
//! the `embedContent` REST endpoint with retry and backoff.
//!
//! # Retry strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{Error, Result};

const MAX_RETRIES: u32 = 5;

/// Trait for embedding backends.
///
/// A client embeds one text at a time; the vector width is fixed per client
/// and must match the store's vector column.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Model identifier (e.g. `"models/text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;
    /// Embed a single text for retrieval.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Embedding client for the Gemini `embedContent` REST API.
///
/// Sends `POST {base}/v1beta/{model}:embedContent?key={api_key}` with the
/// `RETRIEVAL_DOCUMENT` task hint. A response without a vector is a hard
/// error; there is no zero-vector fallback.
pub struct GeminiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiEmbedder {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Embedding(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.embedding_model.clone(),
            dims: config.embedding_dims,
            api_key: config.embedding_api_key.clone(),
            base_url: config.embedding_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

#[async_trait]
impl EmbeddingClient for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "content": { "parts": [{ "text": text }] },
            "taskType": "RETRIEVAL_DOCUMENT",
        });

        let mut last_err = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self.client.post(self.endpoint()).json(&body).send().await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::Embedding(format!("invalid response: {e}")))?;
                        return parse_embed_response(&json);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::Embedding(format!(
                            "embedding API error {status}: {body_text}"
                        )));
                        continue;
                    }

                    // Client error (not 429): don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Embedding(format!(
                        "embedding API error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Embedding(format!("request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::Embedding("embedding failed after retries".to_string())))
    }
}

/// Extract `embedding.values` from an `embedContent` response.
fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| {
            Error::Embedding("invalid embedding response: missing embedding.values".to_string())
        })?;

    values
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::Embedding(format!(
                    "invalid embedding response: non-numeric value {v} in embedding.values"
                ))
            })
        })
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
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
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
