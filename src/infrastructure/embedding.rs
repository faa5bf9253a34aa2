use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::error::Error;

/// Client for an OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Inputs are split into sub-batches bounded by a maximum text count and a
/// maximum total character budget, preserving order across batches. Each
/// provider call retries rate-limit and transport failures with exponential
/// backoff; exhausting the attempt ceiling fails the whole `embed` call, so
/// a batch is embedded completely or not at all.
pub struct RemoteEmbeddingClient {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
    max_batch_size: usize,
    max_batch_chars: usize,
    max_attempts: u32,
    backoff: Duration,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::EmbeddingService(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
            max_batch_size: config.max_batch_size,
            max_batch_chars: config.max_batch_chars,
            max_attempts: config.max_attempts,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// One provider call with the retry policy applied.
    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        let url = format!("{}/embeddings", self.api_base);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.try_embed_batch(&url, batch).await {
                Ok(vectors) => return Ok(vectors),
                Err(CallFailure::Fatal(err)) => return Err(err),
                Err(CallFailure::Transient(reason)) => {
                    if attempt >= self.max_attempts {
                        return Err(Error::EmbeddingService(format!(
                            "giving up after {} attempts: {}",
                            attempt, reason
                        )));
                    }
                    let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                    log::warn!(
                        "Embedding call failed (attempt {}/{}): {}. Retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        reason,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_embed_batch(
        &self,
        url: &str,
        batch: &[String],
    ) -> Result<Vec<Vec<f32>>, CallFailure> {
        let mut request = self.http.post(url).json(&EmbeddingsRequest {
            model: &self.model,
            input: batch,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CallFailure::Transient(format!("transport error: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CallFailure::Transient(format!("status {}", status)));
        }
        if !status.is_success() {
            return Err(CallFailure::Fatal(Error::EmbeddingService(format!(
                "provider rejected request with status {}",
                status
            ))));
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            CallFailure::Fatal(Error::EmbeddingService(format!(
                "malformed provider response: {}",
                e
            )))
        })?;

        if parsed.data.len() != batch.len() {
            return Err(CallFailure::Fatal(Error::EmbeddingService(format!(
                "provider returned {} vectors for {} inputs",
                parsed.data.len(),
                batch.len()
            ))));
        }

        // The provider reports each row's input index; order by it rather
        // than trusting response order.
        let mut rows = parsed.data;
        rows.sort_by_key(|row| row.index);
        let vectors: Vec<Vec<f32>> = rows.into_iter().map(|row| row.embedding).collect();

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(CallFailure::Fatal(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                }));
            }
        }

        Ok(vectors)
    }
}

enum CallFailure {
    /// Worth retrying: rate limit, 5xx, transport/timeout.
    Transient(String),
    /// Not worth retrying: the provider rejected the request itself.
    Fatal(Error),
}

/// Greedy batch split bounded by text count and character budget. Every
/// batch holds at least one text, so an oversized single text still goes out
/// alone rather than looping forever.
fn split_batches(texts: &[String], max_size: usize, max_chars: usize) -> Vec<&[String]> {
    let mut batches = Vec::new();
    let mut start = 0;
    while start < texts.len() {
        let mut end = start + 1;
        let mut chars = texts[start].len();
        while end < texts.len()
            && end - start < max_size
            && chars + texts[end].len() <= max_chars
        {
            chars += texts[end].len();
            end += 1;
        }
        batches.push(&texts[start..end]);
        start = end;
    }
    batches
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let batches = split_batches(texts, self.max_batch_size, self.max_batch_chars);
        log::debug!(
            "Embedding {} texts in {} provider call(s)",
            texts.len(),
            batches.len()
        );
        let mut out = Vec::with_capacity(texts.len());
        for batch in batches {
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
