//! OpenAI-compatible embeddings client.
//!
//! Wire contract: request `{model, input}` where input is a string or an
//! array of strings; response `{data: [{embedding, index}], usage}`.
//! Output vectors are re-sorted by the provider's declared `index`, so
//! batch order always matches input order. The client never retries;
//! retry policy belongs to the caller.

use std::borrow::Cow;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::Embedder;
use crate::core::config::EmbeddingSettings;
use crate::core::errors::RagError;

pub struct EmbeddingClient {
    settings: EmbeddingSettings,
    http: Client,
    api_key: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
    #[serde(default)]
    usage: Option<UsageRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct UsageRow {
    total_tokens: u64,
}

impl EmbeddingClient {
    pub fn new(settings: EmbeddingSettings) -> Result<Self, RagError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(RagError::network)?;

        Ok(Self {
            settings,
            http,
            api_key: RwLock::new(None),
        })
    }

    fn credential(&self) -> Result<String, RagError> {
        let guard = self.api_key.read().unwrap_or_else(|poison| poison.into_inner());
        guard.clone().ok_or(RagError::CredentialMissing)
    }

    async fn post_embeddings(&self, input: Value, expected: usize) -> Result<Vec<Vec<f32>>, RagError> {
        let key = self.credential()?;
        let url = format!("{}/embeddings", self.settings.base_url.trim_end_matches('/'));

        let res = self
            .http
            .post(&url)
            .bearer_auth(&key)
            .json(&json!({ "model": self.settings.model, "input": input }))
            .send()
            .await
            .map_err(RagError::network)?;

        let status = res.status();
        if !status.is_success() {
            let message = res.text().await.unwrap_or_default();
            return Err(RagError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let body = res.text().await.map_err(RagError::network)?;
        let parsed: EmbeddingsResponse = serde_json::from_str(&body)
            .map_err(|err| RagError::MalformedResponse(err.to_string()))?;

        if parsed.data.len() != expected {
            return Err(RagError::MalformedResponse(format!(
                "expected {expected} embeddings, provider returned {}",
                parsed.data.len()
            )));
        }
        if let Some(usage) = parsed.usage {
            tracing::debug!(total_tokens = usage.total_tokens, "embedding usage");
        }

        vectors_in_input_order(parsed.data, self.settings.dimensions)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn name(&self) -> &str {
        "openai-compat"
    }

    fn dimensions(&self) -> usize {
        self.settings.dimensions
    }

    fn is_configured(&self) -> bool {
        let guard = self.api_key.read().unwrap_or_else(|poison| poison.into_inner());
        guard.as_deref().is_some_and(|key| !key.is_empty())
    }

    fn set_credential(&self, key: &str) -> Result<(), RagError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(RagError::InvalidInput(
                "credential must not be empty".to_string(),
            ));
        }
        let mut guard = self.api_key.write().unwrap_or_else(|poison| poison.into_inner());
        *guard = Some(key.to_string());
        Ok(())
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let input = truncate_chars(text, self.settings.max_input_chars);
        let mut vectors = self.post_embeddings(json!(input.as_ref()), 1).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::MalformedResponse("empty data array".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = self.settings.batch_size.max(1);
        let batches: Vec<&[String]> = texts.chunks(batch_size).collect();
        let last = batches.len() - 1;

        let mut all = Vec::with_capacity(texts.len());
        for (i, batch) in batches.iter().enumerate() {
            let inputs: Vec<Cow<'_, str>> = batch
                .iter()
                .map(|text| truncate_chars(text, self.settings.max_input_chars))
                .collect();
            let vectors = self.post_embeddings(json!(inputs), batch.len()).await?;
            all.extend(vectors);

            if i < last && self.settings.batch_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.settings.batch_delay_ms)).await;
            }
        }

        Ok(all)
    }
}

/// Deterministic char-boundary truncation of oversized inputs.
fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().take(max_chars).collect())
    }
}

/// Restore input order from the provider's declared indices and enforce
/// the fixed vector length.
fn vectors_in_input_order(
    mut rows: Vec<EmbeddingRow>,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, RagError> {
    rows.sort_by_key(|row| row.index);

    let mut vectors = Vec::with_capacity(rows.len());
    for (pos, row) in rows.into_iter().enumerate() {
        if row.index != pos {
            return Err(RagError::MalformedResponse(format!(
                "non-contiguous embedding index {}",
                row.index
            )));
        }
        if row.embedding.len() != dimensions {
            return Err(RagError::DimensionMismatch {
                expected: dimensions,
                actual: row.embedding.len(),
            });
        }
        vectors.push(row.embedding);
    }
    Ok(vectors)
}
