use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

mod azure_openai;

pub use azure_openai::AzureOpenAiClient;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Embedding endpoint responded with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the endpoint.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider returned a different number of vectors than inputs.
    #[error("Expected {expected} embeddings, received {actual}")]
    CountMismatch {
        /// Number of inputs submitted.
        expected: usize,
        /// Number of vectors returned.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let vectors = self.generate_embeddings(vec![text.to_string()]).await?;
        let actual = vectors.len();
        match <[Vec<f32>; 1]>::try_from(vectors) {
            Ok([vector]) => Ok(vector),
            Err(_) => Err(EmbeddingClientError::CountMismatch {
                expected: 1,
                actual,
            }),
        }
    }
}

/// Deterministic offline embedding client.
///
/// Hashes bytes into a fixed number of slots and L2-normalizes the result. Useful for tests
/// and dry runs where no embedding deployment is reachable.
pub struct DeterministicEmbeddingClient {
    dimension: usize,
}

impl DeterministicEmbeddingClient {
    /// Construct a client producing vectors of `dimension` components.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            embedding[idx % dimension] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for DeterministicEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }

        tracing::debug!(
            inputs = texts.len(),
            dimension = self.dimension,
            "Generating deterministic embeddings"
        );

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Build the embedding client described by the configuration.
pub fn get_embedding_client(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    Ok(Box::new(AzureOpenAiClient::new(config)?))
}
