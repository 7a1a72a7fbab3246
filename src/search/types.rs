//! Shared types used by the search client and the indexing service.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors returned while interacting with the search service.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Endpoint failed to parse or normalize.
    #[error("Invalid search endpoint: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Search service responded with an unexpected status code.
    #[error("Unexpected search service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Documents could not be encoded as a request body.
    #[error("Failed to encode index batch: {0}")]
    Encode(#[from] serde_json::Error),
    /// Batch accepted, but some documents were rejected.
    #[error("{failed} of {total} documents were rejected: {first_error}")]
    PartialFailure {
        /// Number of rejected documents.
        failed: usize,
        /// Number of documents submitted.
        total: usize,
        /// Error message reported for the first rejected document.
        first_error: String,
    },
}

/// Document written to the index, in one of the two supported layouts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IndexEntry {
    /// Generic vector-store layout.
    Standard {
        /// Document key.
        id: String,
        /// Chunk text.
        content: String,
        /// Chunk metadata serialized as a JSON string.
        metadata: String,
        /// Embedding of `content`.
        content_vector: Vec<f32>,
    },
    /// Titled layout with per-file id prefixes.
    Titled {
        /// Document key, `{prefix}_{n}`.
        id: String,
        /// Display title, `{file stem}_{n}`.
        #[serde(rename = "docTitle")]
        doc_title: String,
        /// Chunk text.
        description: String,
        /// Embedding of `description`.
        #[serde(rename = "descriptionVector")]
        description_vector: Vec<f32>,
    },
}

impl IndexEntry {
    /// Document key.
    pub fn id(&self) -> &str {
        match self {
            Self::Standard { id, .. } | Self::Titled { id, .. } => id,
        }
    }

    /// Embedding stored with the document.
    pub fn vector(&self) -> &[f32] {
        match self {
            Self::Standard { content_vector, .. } => content_vector,
            Self::Titled {
                description_vector, ..
            } => description_vector,
        }
    }
}

/// Result of a fully accepted upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    /// Documents written by the service.
    pub succeeded: usize,
}

/// Scored document returned by a vector query.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    /// Similarity score reported by the service.
    #[serde(rename = "@search.score")]
    pub score: f64,
    /// Stored fields of the matching document.
    #[serde(flatten)]
    pub document: Map<String, Value>,
}

impl SearchHit {
    /// Document key, when returned.
    pub fn id(&self) -> Option<&str> {
        self.document.get("id").and_then(Value::as_str)
    }

    /// First present text field among `fields`.
    pub fn text(&self, fields: &[&str]) -> Option<&str> {
        fields
            .iter()
            .find_map(|field| self.document.get(*field).and_then(Value::as_str))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexBatchResponse {
    #[serde(default)]
    pub(crate) value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndexingResult {
    pub(crate) key: String,
    pub(crate) status: bool,
    #[serde(rename = "errorMessage")]
    pub(crate) error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub(crate) value: Vec<SearchHit>,
}
