//! Ingestion run: list the container, skip known files, and index the rest one at a time.
//!
//! A run either aborts before touching anything (the container cannot be listed, or the
//! ledger cannot answer for every listed name) or processes each unseen supported file
//! through fetch, extract, and upsert. A file is committed to the ledger only after its
//! chunks were accepted by the index; any earlier failure leaves it for the next run.

mod report;

pub use report::{FileFailure, FileStage, RunReport};

use std::sync::Arc;

use thiserror::Error;

use crate::{
    config::Config,
    embedding::{EmbeddingClientError, get_embedding_client},
    extraction::{DocumentKind, extract_text},
    ledger::{CosmosLedgerStore, Ledger, LedgerError, LedgerStore},
    metrics::IngestMetrics,
    processing::{IndexOutcome, IndexingService, IndexingSettings},
    search::{AzureSearchService, SearchError},
    storage::{BlobStorageClient, ObjectStore, StorageError},
};

/// Failure to build a service client from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Object store client could not be created.
    #[error("Failed to set up blob storage client: {0}")]
    Storage(#[from] StorageError),
    /// Ledger store client could not be created.
    #[error("Failed to set up ledger store client: {0}")]
    Ledger(#[from] LedgerError),
    /// Search client could not be created.
    #[error("Failed to set up search client: {0}")]
    Search(#[from] SearchError),
    /// Embedding client could not be created.
    #[error("Failed to set up embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
}

/// Errors that abort a run before any file is processed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Clients could not be constructed.
    #[error(transparent)]
    Setup(#[from] SetupError),
    /// Container listing failed.
    #[error("Failed to list container {container}: {source}")]
    Listing {
        /// Container being scanned.
        container: String,
        /// Underlying storage error.
        #[source]
        source: StorageError,
    },
    /// The ledger could not answer whether a file was already ingested.
    #[error("Ledger unavailable while checking {filename}: {source}")]
    LedgerUnavailable {
        /// Name whose lookup failed.
        filename: String,
        /// Underlying ledger error.
        #[source]
        source: LedgerError,
    },
    /// Dedup answers did not cover every listed file.
    #[error("Dedup check returned {checked} results for {listed} listed files")]
    DedupMismatch {
        /// Objects listed.
        listed: usize,
        /// Ledger answers received.
        checked: usize,
    },
}

/// Build the indexing service described by the configuration.
pub fn build_indexer(config: &Config) -> Result<IndexingService, SetupError> {
    let embedder = get_embedding_client(&config.embedding)?;
    let index = AzureSearchService::new(&config.search)?;
    let settings = IndexingSettings {
        chunking: config.chunking,
        dimension: config.embedding.dimension,
        layout: config.search.layout,
        max_prefix_attempts: config.ledger.max_id_attempts,
    };
    Ok(IndexingService::new(embedder, Box::new(index), settings))
}

/// Sequential ingestion over an object store, a ledger, and an indexing service.
pub struct IngestionPipeline {
    storage: Box<dyn ObjectStore>,
    ledger: Ledger<Box<dyn LedgerStore>>,
    indexer: IndexingService,
    container: String,
    index_name: String,
    metrics: Arc<IngestMetrics>,
}

impl IngestionPipeline {
    /// Assemble a pipeline from explicit collaborators.
    pub fn new(
        storage: Box<dyn ObjectStore>,
        ledger: Ledger<Box<dyn LedgerStore>>,
        indexer: IndexingService,
        container: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            ledger,
            indexer,
            container: container.into(),
            index_name: index_name.into(),
            metrics: Arc::new(IngestMetrics::new()),
        }
    }

    /// Share a metrics accumulator across runs.
    pub fn with_metrics(mut self, metrics: Arc<IngestMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the Azure-backed pipeline described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let storage =
            BlobStorageClient::new(config.blob.connection.clone()).map_err(SetupError::from)?;
        let store = CosmosLedgerStore::new(&config.ledger).map_err(SetupError::from)?;
        let ledger: Ledger<Box<dyn LedgerStore>> =
            Ledger::new(Box::new(store), config.ledger.max_id_attempts);
        let indexer = build_indexer(config)?;

        Ok(Self::new(
            Box::new(storage),
            ledger,
            indexer,
            config.blob.container.clone(),
            config.search.index_name.clone(),
        ))
    }

    /// Metrics shared with this pipeline.
    pub fn metrics(&self) -> &Arc<IngestMetrics> {
        &self.metrics
    }

    /// Execute one ingestion run.
    ///
    /// Per-file failures are reported in the returned [`RunReport`]; only listing and
    /// dedup failures abort the run.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let listed = self.storage.list(&self.container).await.map_err(|source| {
            tracing::error!(container = %self.container, error = %source, "Container listing failed");
            PipelineError::Listing {
                container: self.container.clone(),
                source,
            }
        })?;

        let mut report = RunReport::default();
        if listed.is_empty() {
            tracing::info!(container = %self.container, "Container is empty; nothing to ingest");
            self.metrics.record_run();
            return Ok(report);
        }

        let unseen = self.unseen(&listed, &mut report).await?;
        let candidates = self.supported(unseen, &mut report);
        tracing::info!(
            listed = listed.len(),
            known = report.already_ingested.len(),
            unsupported = report.skipped_unsupported.len(),
            pending = candidates.len(),
            "Dedup check complete"
        );

        for (name, kind) in candidates {
            match self.ingest_file(&name, kind).await {
                Ok(outcome) => {
                    self.metrics.record_document(outcome.chunk_count as u64);
                    report.indexed.push(name);
                }
                Err(failure) => {
                    tracing::error!(
                        file = %failure.filename,
                        stage = %failure.stage,
                        error = %failure.message,
                        "File left for the next run"
                    );
                    self.metrics.record_failure();
                    report.failed.push(failure);
                }
            }
        }

        self.metrics.record_run();
        tracing::info!(
            indexed = report.indexed.len(),
            failed = report.failed.len(),
            "Ingestion run finished"
        );
        Ok(report)
    }

    /// Ask the ledger about every listed name; any failure aborts the run.
    async fn unseen(
        &self,
        listed: &[String],
        report: &mut RunReport,
    ) -> Result<Vec<String>, PipelineError> {
        let mut answers = Vec::with_capacity(listed.len());
        for name in listed {
            match self.ledger.is_known(name).await {
                Ok(known) => answers.push(known),
                Err(source) => {
                    tracing::error!(file = %name, error = %source, "Ledger lookup failed; aborting run");
                    return Err(PipelineError::LedgerUnavailable {
                        filename: name.clone(),
                        source,
                    });
                }
            }
        }

        if answers.len() != listed.len() {
            return Err(PipelineError::DedupMismatch {
                listed: listed.len(),
                checked: answers.len(),
            });
        }

        let mut unseen = Vec::new();
        for (name, known) in listed.iter().zip(answers) {
            if known {
                report.already_ingested.push(name.clone());
            } else {
                unseen.push(name.clone());
            }
        }
        Ok(unseen)
    }

    fn supported(
        &self,
        unseen: Vec<String>,
        report: &mut RunReport,
    ) -> Vec<(String, DocumentKind)> {
        let mut accepted = Vec::with_capacity(unseen.len());
        for name in unseen {
            match DocumentKind::from_filename(&name) {
                Some(kind) => accepted.push((name, kind)),
                None => {
                    tracing::info!(file = %name, "Skipping file with unsupported extension");
                    self.metrics.record_skipped();
                    report.skipped_unsupported.push(name);
                }
            }
        }
        accepted
    }

    async fn ingest_file(&self, name: &str, kind: DocumentKind) -> Result<IndexOutcome, FileFailure> {
        let fail = |stage: FileStage, message: String| FileFailure {
            filename: name.to_string(),
            stage,
            message,
        };

        let bytes = self
            .storage
            .download(&self.container, name)
            .await
            .map_err(|error| fail(FileStage::Fetch, error.to_string()))?;
        let text = extract_text(kind, &bytes)
            .map_err(|error| fail(FileStage::Extract, error.to_string()))?;
        let outcome = self
            .indexer
            .index_document(&text, name, &self.index_name)
            .await
            .map_err(|error| fail(FileStage::Upsert, error.to_string()))?;
        self.ledger
            .record(name)
            .await
            .map_err(|error| fail(FileStage::Commit, error.to_string()))?;

        tracing::info!(file = name, chunks = outcome.chunk_count, "File ingested");
        Ok(outcome)
    }
}
