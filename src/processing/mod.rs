//! Indexing step: chunking, embedding, and search index writes.

pub mod chunking;
mod service;
pub mod types;

pub use chunking::{ChunkSettings, TextSpan, build_documents, chunk_text};
pub use service::{IndexingService, IndexingSettings};
pub use types::{ChunkMetadata, ChunkingError, DocumentChunk, IndexOutcome, ProcessingError};
