//! Shared plumbing for the Azure REST clients: connection strings and request signing.

pub(crate) mod auth;
pub mod connection;

pub use connection::{BlobConnection, BlobCredential, ConnectionStringError, CosmosConnection};
