//! Indexing service coordinating chunking, embedding, and search index writes.

use crate::{
    embedding::{EmbeddingClient, EmbeddingClientError},
    ledger::IdSource,
    processing::{
        chunking::{ChunkSettings, build_documents},
        types::{DocumentChunk, IndexOutcome, ProcessingError},
    },
    search::{IndexEntry, IndexLayout, SearchHit, VectorIndex},
};

/// Knobs for [`IndexingService`].
#[derive(Debug, Clone, Copy)]
pub struct IndexingSettings {
    /// Chunk budget.
    pub chunking: ChunkSettings,
    /// Expected embedding length.
    pub dimension: usize,
    /// Field layout of the target index.
    pub layout: IndexLayout,
    /// Id prefix candidates probed before giving up (titled layout).
    pub max_prefix_attempts: usize,
}

/// Turns extracted text into embedded index entries and writes them in one batch.
///
/// The service owns the embedding client and the index transport; it holds no per-document
/// state, so a single instance handles every file of a run.
pub struct IndexingService {
    embedding_client: Box<dyn EmbeddingClient>,
    index: Box<dyn VectorIndex>,
    settings: IndexingSettings,
    id_source: IdSource,
}

impl IndexingService {
    /// Build a service over the given embedding client and index.
    pub fn new(
        embedding_client: Box<dyn EmbeddingClient>,
        index: Box<dyn VectorIndex>,
        settings: IndexingSettings,
    ) -> Self {
        Self {
            embedding_client,
            index,
            settings,
            id_source: Box::new(|| uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Replace the generator used for document ids and id prefixes.
    pub fn with_id_source<F>(mut self, source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_source = Box::new(source);
        self
    }

    /// Chunk, embed, and index a document.
    ///
    /// Either every chunk is accepted by the index or an error is returned.
    pub async fn index_document(
        &self,
        text: &str,
        file_name: &str,
        index_name: &str,
    ) -> Result<IndexOutcome, ProcessingError> {
        let chunks = build_documents(text, file_name, index_name, &self.settings.chunking)?;
        if chunks.is_empty() {
            tracing::info!(file = file_name, "Document has no text to index");
            return Ok(IndexOutcome::default());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
        let vectors = self.embedding_client.generate_embeddings(texts).await?;
        if vectors.len() != chunks.len() {
            return Err(EmbeddingClientError::CountMismatch {
                expected: chunks.len(),
                actual: vectors.len(),
            }
            .into());
        }
        if let Some(vector) = vectors
            .iter()
            .find(|vector| vector.len() != self.settings.dimension)
        {
            return Err(ProcessingError::DimensionMismatch {
                expected: self.settings.dimension,
                actual: vector.len(),
            });
        }

        let chunk_count = chunks.len();
        let (entries, id_prefix) = match self.settings.layout {
            IndexLayout::Standard => (self.standard_entries(chunks, vectors)?, None),
            IndexLayout::Titled => {
                let prefix = self.allocate_prefix(index_name).await?;
                (titled_entries(&prefix, file_name, chunks, vectors), Some(prefix))
            }
        };

        let summary = self.index.upsert_documents(index_name, entries).await?;
        tracing::info!(
            file = file_name,
            index = index_name,
            chunks = chunk_count,
            prefix = ?id_prefix,
            "Document indexed"
        );

        Ok(IndexOutcome {
            chunk_count,
            documents_written: summary.succeeded,
            id_prefix,
        })
    }

    /// Embed `query` and return the `k` nearest documents.
    pub async fn search(
        &self,
        index_name: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, ProcessingError> {
        let vector = self.embedding_client.embed_query(query).await?;
        if vector.len() != self.settings.dimension {
            return Err(ProcessingError::DimensionMismatch {
                expected: self.settings.dimension,
                actual: vector.len(),
            });
        }
        Ok(self.index.search(index_name, vector, k).await?)
    }

    fn standard_entries(
        &self,
        chunks: Vec<DocumentChunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<IndexEntry>, ProcessingError> {
        chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                Ok(IndexEntry::Standard {
                    id: (self.id_source)(),
                    metadata: serde_json::to_string(&chunk.metadata)?,
                    content: chunk.content,
                    content_vector: vector,
                })
            })
            .collect()
    }

    /// Find a prefix whose first document key is not yet taken.
    async fn allocate_prefix(&self, index_name: &str) -> Result<String, ProcessingError> {
        let attempts = self.settings.max_prefix_attempts.max(1);
        for attempt in 1..=attempts {
            let candidate = (self.id_source)();
            if !self
                .index
                .document_exists(index_name, &format!("{candidate}_1"))
                .await?
            {
                return Ok(candidate);
            }
            tracing::warn!(prefix = %candidate, attempt, "Document id prefix already in use; regenerating");
        }
        Err(ProcessingError::PrefixAllocationExhausted { attempts })
    }
}

/// Ids count from 1 while titles count from 0.
fn titled_entries(
    prefix: &str,
    file_name: &str,
    chunks: Vec<DocumentChunk>,
    vectors: Vec<Vec<f32>>,
) -> Vec<IndexEntry> {
    let stem = strip_extension(file_name);
    chunks
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (chunk, vector))| IndexEntry::Titled {
            id: format!("{prefix}_{}", i + 1),
            doc_title: format!("{stem}_{i}"),
            description: chunk.content,
            description_vector: vector,
        })
        .collect()
}

/// Drop the last extension of the final path component; leading dots do not start one.
pub(crate) fn strip_extension(name: &str) -> &str {
    let base_start = name.rfind('/').map_or(0, |slash| slash + 1);
    let base = &name[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();
    match base[leading_dots..].rfind('.') {
        Some(dot) => &name[..base_start + leading_dots + dot],
        None => name,
    }
}
