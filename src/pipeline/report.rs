//! Outcome of a single ingestion run.

use std::fmt;

use serde::Serialize;

/// Per-file step at which processing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStage {
    /// Download from the object store.
    Fetch,
    /// Text extraction.
    Extract,
    /// Chunk, embed, and index write.
    Upsert,
    /// Ledger commit after a successful upsert.
    Commit,
}

impl fmt::Display for FileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Upsert => "upsert",
            Self::Commit => "commit",
        };
        f.write_str(label)
    }
}

/// A file left un-ledgered for the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// Object name.
    pub filename: String,
    /// Step that failed.
    pub stage: FileStage,
    /// Rendered error.
    pub message: String,
}

/// What happened to every listed object during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Indexed and committed, in processing order.
    pub indexed: Vec<String>,
    /// Unseen but with an unsupported extension.
    pub skipped_unsupported: Vec<String>,
    /// Already present in the ledger.
    pub already_ingested: Vec<String>,
    /// Failed at some step; retried next run.
    pub failed: Vec<FileFailure>,
}

impl RunReport {
    /// Whether any file failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}
