//! Parsing for the `Key=Value;Key=Value` connection strings handed out by the Azure portal.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

const DEVELOPMENT_ACCOUNT: &str = "devstoreaccount1";
const DEVELOPMENT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEVELOPMENT_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Errors raised while interpreting a connection string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    /// A field required to reach the service was absent.
    #[error("connection string is missing `{0}`")]
    MissingField(&'static str),
    /// A segment did not follow the `Key=Value` shape.
    #[error("malformed connection string segment: {0}")]
    MalformedSegment(String),
    /// The account key could not be base64-decoded.
    #[error("account key is not valid base64")]
    InvalidKey,
}

/// Credential used to authorize blob requests.
#[derive(Clone, PartialEq, Eq)]
pub enum BlobCredential {
    /// Decoded storage account key, used for `SharedKey` signing.
    SharedKey(Vec<u8>),
    /// Shared access signature query string (without the leading `?`).
    Sas(String),
}

impl fmt::Debug for BlobCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedKey(_) => f.write_str("SharedKey(<redacted>)"),
            Self::Sas(_) => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// Resolved blob service endpoint and credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobConnection {
    /// Storage account name, used in `SharedKey` canonicalization.
    pub account_name: String,
    /// Blob service endpoint without a trailing slash.
    pub endpoint: String,
    /// Credential attached to each request.
    pub credential: BlobCredential,
}

impl BlobConnection {
    /// Parse a storage account connection string.
    ///
    /// Accepts account-key strings (`AccountName`/`AccountKey` with an optional `BlobEndpoint`
    /// or `EndpointSuffix`), SAS strings (`BlobEndpoint` + `SharedAccessSignature`), and
    /// `UseDevelopmentStorage=true` for the local emulator.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let fields = parse_segments(raw)?;

        if fields
            .get("usedevelopmentstorage")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"))
        {
            return Ok(Self {
                account_name: DEVELOPMENT_ACCOUNT.to_string(),
                endpoint: DEVELOPMENT_BLOB_ENDPOINT.to_string(),
                credential: BlobCredential::SharedKey(decode_key(DEVELOPMENT_KEY)?),
            });
        }

        let account_name = fields.get("accountname").cloned();
        let endpoint = match (fields.get("blobendpoint"), account_name.as_deref()) {
            (Some(endpoint), _) => endpoint.trim_end_matches('/').to_string(),
            (None, Some(account)) => {
                let protocol = fields
                    .get("defaultendpointsprotocol")
                    .map(String::as_str)
                    .unwrap_or("https");
                let suffix = fields
                    .get("endpointsuffix")
                    .map(String::as_str)
                    .unwrap_or("core.windows.net");
                format!("{protocol}://{account}.blob.{suffix}")
            }
            (None, None) => return Err(ConnectionStringError::MissingField("BlobEndpoint")),
        };

        let account_name = match account_name {
            Some(name) => name,
            None => account_from_endpoint(&endpoint)
                .ok_or(ConnectionStringError::MissingField("AccountName"))?,
        };

        let credential = if let Some(key) = fields.get("accountkey") {
            BlobCredential::SharedKey(decode_key(key)?)
        } else if let Some(sas) = fields.get("sharedaccesssignature") {
            BlobCredential::Sas(sas.trim_start_matches('?').to_string())
        } else {
            return Err(ConnectionStringError::MissingField("AccountKey"));
        };

        Ok(Self {
            account_name,
            endpoint,
            credential,
        })
    }
}

/// Resolved Cosmos DB account endpoint and master key.
#[derive(Clone, PartialEq, Eq)]
pub struct CosmosConnection {
    /// Account endpoint without a trailing slash.
    pub endpoint: String,
    /// Decoded master key used for request signatures.
    pub key: Vec<u8>,
}

impl fmt::Debug for CosmosConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosConnection")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .finish()
    }
}

impl CosmosConnection {
    /// Parse an `AccountEndpoint=...;AccountKey=...;` connection string.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let fields = parse_segments(raw)?;
        let endpoint = fields
            .get("accountendpoint")
            .ok_or(ConnectionStringError::MissingField("AccountEndpoint"))?
            .trim_end_matches('/')
            .to_string();
        let key = fields
            .get("accountkey")
            .ok_or(ConnectionStringError::MissingField("AccountKey"))?;

        Ok(Self {
            endpoint,
            key: decode_key(key)?,
        })
    }
}

fn parse_segments(raw: &str) -> Result<HashMap<String, String>, ConnectionStringError> {
    let mut fields = HashMap::new();
    for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        // Keys and SAS tokens carry `=` themselves, so only the first one separates.
        let (key, value) = segment
            .split_once('=')
            .ok_or_else(|| ConnectionStringError::MalformedSegment(segment.to_string()))?;
        fields.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(fields)
}

fn decode_key(key: &str) -> Result<Vec<u8>, ConnectionStringError> {
    STANDARD
        .decode(key.trim())
        .map_err(|_| ConnectionStringError::InvalidKey)
}

fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let url = reqwest::Url::parse(endpoint).ok()?;
    let host = url.host_str()?;
    host.split('.')
        .next()
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}
