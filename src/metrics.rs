use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing ingestion activity since startup.
#[derive(Default)]
pub struct IngestMetrics {
    runs: AtomicU64,
    documents_indexed: AtomicU64,
    chunks_indexed: AtomicU64,
    files_skipped: AtomicU64,
    files_failed: AtomicU64,
}

impl IngestMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed run.
    pub fn record_run(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an indexed document and the number of chunks produced for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_indexed.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a file skipped for its extension.
    pub fn record_skipped(&self) {
        self.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a file left for the next run after a failure.
    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            documents_indexed: self.documents_indexed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Completed runs.
    pub runs: u64,
    /// Documents indexed and committed to the ledger.
    pub documents_indexed: u64,
    /// Total chunk count across indexed documents.
    pub chunks_indexed: u64,
    /// Files ignored because of their extension.
    pub files_skipped: u64,
    /// Files that failed a step and stayed un-ledgered.
    pub files_failed: u64,
}
