//! Dedup ledger recording which source files have already been ingested.
//!
//! The ledger is a thin layer over a [`LedgerStore`]: membership checks are exact,
//! case-sensitive filename matches, and each committed file receives a freshly allocated
//! opaque identifier. Identifier allocation probes the store for collisions and gives up
//! after a bounded number of attempts instead of spinning forever.

mod cosmos;

pub use cosmos::CosmosLedgerStore;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Attempts made to find an unused record identifier before giving up.
pub const DEFAULT_MAX_ID_ATTEMPTS: usize = 16;

/// Generator of candidate record identifiers.
pub type IdSource = Box<dyn Fn() -> String + Send + Sync>;

/// One ingested file as persisted in the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Opaque identifier, unique across the ledger.
    pub id: String,
    /// Exact object name as listed in the source container.
    pub filename: String,
}

/// Errors raised by the ledger and its backing stores.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Endpoint could not be turned into a request URL.
    #[error("Invalid ledger URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Metadata store responded with an unexpected status code.
    #[error("Unexpected ledger store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Store-specific failure that is not tied to an HTTP exchange.
    #[error("Ledger store failure: {0}")]
    Store(String),
    /// Every candidate identifier collided with an existing record.
    #[error("No unused ledger id found after {attempts} attempts")]
    IdAllocationExhausted {
        /// Number of candidates probed.
        attempts: usize,
    },
}

/// Record field whose value is used as the partition key of the ledger container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionKey {
    /// Partitioned on `/id`.
    #[default]
    Id,
    /// Partitioned on `/filename`.
    Filename,
}

impl PartitionKey {
    /// Partition key value carried by `record`.
    pub fn value_of<'a>(&self, record: &'a LedgerRecord) -> &'a str {
        match self {
            Self::Id => &record.id,
            Self::Filename => &record.filename,
        }
    }
}

impl std::str::FromStr for PartitionKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('/').to_lowercase().as_str() {
            "id" => Ok(Self::Id),
            "filename" => Ok(Self::Filename),
            _ => Err(()),
        }
    }
}

/// Metadata-store operations the ledger relies on.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Whether any record carries exactly this filename.
    async fn filename_exists(&self, filename: &str) -> Result<bool, LedgerError>;

    /// Whether any record carries exactly this identifier.
    async fn id_exists(&self, id: &str) -> Result<bool, LedgerError>;

    /// Insert or replace a record.
    async fn upsert(&self, record: &LedgerRecord) -> Result<(), LedgerError>;
}

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Box<T> {
    async fn filename_exists(&self, filename: &str) -> Result<bool, LedgerError> {
        (**self).filename_exists(filename).await
    }

    async fn id_exists(&self, id: &str) -> Result<bool, LedgerError> {
        (**self).id_exists(id).await
    }

    async fn upsert(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        (**self).upsert(record).await
    }
}

/// Tracks ingested filenames on top of a [`LedgerStore`].
pub struct Ledger<S> {
    store: S,
    id_source: IdSource,
    max_id_attempts: usize,
}

impl<S: LedgerStore> Ledger<S> {
    /// Wrap `store`, allocating UUID v4 identifiers with at most `max_id_attempts` probes.
    pub fn new(store: S, max_id_attempts: usize) -> Self {
        Self {
            store,
            id_source: Box::new(|| uuid::Uuid::new_v4().to_string()),
            max_id_attempts: max_id_attempts.max(1),
        }
    }

    /// Replace the identifier generator.
    pub fn with_id_source<F>(mut self, source: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_source = Box::new(source);
        self
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Whether `filename` has already been committed.
    pub async fn is_known(&self, filename: &str) -> Result<bool, LedgerError> {
        self.store.filename_exists(filename).await
    }

    /// Commit `filename` under a newly allocated identifier and return that identifier.
    ///
    /// Filename uniqueness is not checked here; callers consult [`Ledger::is_known`] first.
    pub async fn record(&self, filename: &str) -> Result<String, LedgerError> {
        for attempt in 1..=self.max_id_attempts {
            let candidate = (self.id_source)();
            if self.store.id_exists(&candidate).await? {
                tracing::warn!(id = %candidate, attempt, "Ledger id already taken; regenerating");
                continue;
            }

            let record = LedgerRecord {
                id: candidate,
                filename: filename.to_string(),
            };
            self.store.upsert(&record).await?;
            tracing::info!(file = filename, id = %record.id, "Recorded ingested file");
            return Ok(record.id);
        }

        let error = LedgerError::IdAllocationExhausted {
            attempts: self.max_id_attempts,
        };
        tracing::error!(file = filename, error = %error, "Ledger id allocation failed");
        Err(error)
    }
}
