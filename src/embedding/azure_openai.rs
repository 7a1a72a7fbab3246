//! Azure OpenAI embeddings deployment client.

use crate::config::EmbeddingConfig;
use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inputs sent per request.
const BATCH_SIZE: usize = 16;
const MAX_ATTEMPTS: usize = 3;

/// Embedding client for an Azure OpenAI deployment.
pub struct AzureOpenAiClient {
    pub(crate) client: Client,
    pub(crate) url: String,
    pub(crate) api_key: String,
    pub(crate) api_version: String,
    pub(crate) batch_size: usize,
    pub(crate) max_attempts: usize,
    pub(crate) base_backoff: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

impl AzureOpenAiClient {
    /// Build a client for the deployment named in `config`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingClientError> {
        if config.api_key.trim().is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "missing embedding API key".to_string(),
            ));
        }
        let client = Client::builder()
            .user_agent("rusty-ingest/0.1")
            .timeout(Duration::from_secs(60))
            .build()?;
        let url = format!(
            "{}/openai/deployments/{}/embeddings",
            config.endpoint.trim_end_matches('/'),
            config.deployment
        );
        tracing::debug!(
            url = %url,
            api_version = %config.api_version,
            "Initialized Azure OpenAI embedding client"
        );

        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
            batch_size: BATCH_SIZE,
            max_attempts: MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(500),
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let mut attempt = 1;
        loop {
            let response = self
                .client
                .post(&self.url)
                .query(&[("api-version", self.api_version.as_str())])
                .header("api-key", &self.api_key)
                .json(&EmbeddingRequest { input: batch })
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                let mut parsed: EmbeddingResponse = response.json().await?;
                parsed.data.sort_by_key(|entry| entry.index);
                if parsed.data.len() != batch.len() {
                    return Err(EmbeddingClientError::CountMismatch {
                        expected: batch.len(),
                        actual: parsed.data.len(),
                    });
                }
                return Ok(parsed
                    .data
                    .into_iter()
                    .map(|entry| entry.embedding)
                    .collect());
            }

            if should_retry(status) && attempt < self.max_attempts {
                let delay = self.base_backoff * (1 << attempt.min(5)) as u32;
                tracing::warn!(
                    status = %status,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Embedding request throttled; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingClientError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Embedding request failed");
            return Err(error);
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl EmbeddingClient for AzureOpenAiClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size.max(1)) {
            embeddings.extend(self.embed_batch(batch).await?);
        }
        tracing::debug!(inputs = texts.len(), "Generated embeddings");
        Ok(embeddings)
    }
}
