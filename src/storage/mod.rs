//! Object storage seam: enumerate and download the documents waiting in a container.

mod blob;

pub use blob::BlobStorageClient;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned while talking to the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Endpoint or object name could not be turned into a request URL.
    #[error("Invalid blob URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Blob service responded with an unexpected status code.
    #[error("Unexpected blob service response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Container listing could not be parsed.
    #[error("Malformed container listing: {0}")]
    InvalidListing(String),
    /// Requested object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),
}

/// Minimal object-store surface used by the ingestion run.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Return every object name in `container`, in service order.
    async fn list(&self, container: &str) -> Result<Vec<String>, StorageError>;

    /// Fetch the full contents of a single object.
    async fn download(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError>;
}
