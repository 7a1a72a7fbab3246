//! Azure AI Search vector index integration.

pub mod client;
pub mod schema;
pub mod types;

pub use client::AzureSearchService;
pub use schema::{IndexDefinition, IndexLayout, index_definition};
pub use types::{IndexEntry, SearchError, SearchHit, UpsertSummary};

use async_trait::async_trait;

/// Vector index operations used by ingestion and the admin tooling.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Write every entry in one batch, failing if any document is rejected.
    async fn upsert_documents(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertSummary, SearchError>;

    /// Whether a document with `key` is present.
    async fn document_exists(&self, index: &str, key: &str) -> Result<bool, SearchError>;

    /// Top `k` documents nearest to `vector`.
    async fn search(
        &self,
        index: &str,
        vector: Vec<f32>,
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;

    /// Create or update an index.
    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchError>;
}
