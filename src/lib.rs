#![deny(missing_docs)]

//! Core library for Rusty Ingest, which keeps an Azure AI Search index in sync with a blob
//! container.

/// Azure connection strings and request signing.
pub mod azure;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction from supported document formats.
pub mod extraction;
/// Dedup ledger of ingested files.
pub mod ledger;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Ingestion run orchestration.
pub mod pipeline;
/// Chunking, embedding, and index writes.
pub mod processing;
/// Periodic run timer.
pub mod scheduler;
/// Azure AI Search vector index integration.
pub mod search;
/// Object storage access.
pub mod storage;
