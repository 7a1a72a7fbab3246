//! Core data types and error definitions for the indexing step.

use crate::embedding::EmbeddingClientError;
use crate::search::SearchError;
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Chunk budget of zero characters.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would leave no room for new text in each chunk.
    #[error("chunk overlap ({chunk_overlap}) must be smaller than chunk size ({chunk_size})")]
    OverlapTooLarge {
        /// Requested overlap.
        chunk_overlap: usize,
        /// Requested chunk size.
        chunk_size: usize,
    },
}

/// Errors emitted while indexing a document.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Search service rejected a request.
    #[error("Search request failed: {0}")]
    Search(#[from] SearchError),
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured embedding dimension.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
    /// Every candidate id prefix was already present in the index.
    #[error("No unused document id prefix found after {attempts} attempts")]
    PrefixAllocationExhausted {
        /// Number of candidates probed.
        attempts: usize,
    },
    /// Chunk metadata could not be serialized.
    #[error("Failed to serialize chunk metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Provenance attached to every chunk of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkMetadata {
    /// `/{index}/{file}`.
    pub source: String,
    /// Target index name.
    pub container: String,
    /// Source object name.
    pub file_name: String,
}

/// Chunk of document text ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Chunk text.
    pub content: String,
    /// Provenance shared by all chunks of the document.
    pub metadata: ChunkMetadata,
}

/// Summary of a completed [`crate::processing::IndexingService::index_document`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexOutcome {
    /// Number of chunks produced for the document.
    pub chunk_count: usize,
    /// Documents accepted by the index.
    pub documents_written: usize,
    /// Id prefix allocated for the batch, titled layout only.
    pub id_prefix: Option<String>,
}
