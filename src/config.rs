use crate::azure::{BlobConnection, ConnectionStringError, CosmosConnection};
use crate::ledger::{DEFAULT_MAX_ID_ATTEMPTS, PartitionKey};
use crate::processing::chunking::{ChunkSettings, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::search::IndexLayout;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const DEFAULT_SEARCH_API_VERSION: &str = "2023-11-01";
const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Connection string variable could not be interpreted.
    #[error("Invalid connection string in {variable}: {source}")]
    InvalidConnectionString {
        /// Variable holding the connection string.
        variable: String,
        /// Parse failure.
        #[source]
        source: ConnectionStringError,
    },
}

/// Source container settings.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Parsed storage account connection.
    pub connection: BlobConnection,
    /// Container scanned on every run.
    pub container: String,
}

/// Ledger store settings.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Parsed Cosmos DB connection.
    pub connection: CosmosConnection,
    /// Database holding the ledger container.
    pub database: String,
    /// Ledger container name.
    pub container: String,
    /// Record field used as the container's partition key.
    pub partition_key: PartitionKey,
    /// Identifier candidates probed before giving up.
    pub max_id_attempts: usize,
}

/// Search service settings.
#[derive(Clone)]
pub struct SearchConfig {
    /// Service endpoint, e.g. `https://name.search.windows.net`.
    pub endpoint: String,
    /// Admin API key.
    pub admin_key: String,
    /// Target index.
    pub index_name: String,
    /// REST api-version.
    pub api_version: String,
    /// Field layout of the target index.
    pub layout: IndexLayout,
}

/// Embedding deployment settings.
#[derive(Clone)]
pub struct EmbeddingConfig {
    /// Azure OpenAI resource endpoint.
    pub endpoint: String,
    /// API key.
    pub api_key: String,
    /// Embedding deployment name.
    pub deployment: String,
    /// REST api-version.
    pub api_version: String,
    /// Expected vector length.
    pub dimension: usize,
}

/// Trigger settings for the long-running service.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    /// Spacing between ticks; ticks align to multiples of this since the Unix epoch.
    pub interval: Duration,
    /// Run once immediately at startup.
    pub run_on_startup: bool,
}

/// Runtime configuration for the ingestion service.
#[derive(Debug, Clone)]
pub struct Config {
    /// Source container.
    pub blob: BlobConfig,
    /// Dedup ledger.
    pub ledger: LedgerConfig,
    /// Target search index.
    pub search: SearchConfig,
    /// Embedding deployment.
    pub embedding: EmbeddingConfig,
    /// Chunking parameters.
    pub chunking: ChunkSettings,
    /// Scheduling parameters.
    pub schedule: ScheduleConfig,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            blob: BlobConfig::from_lookup(lookup)?,
            ledger: LedgerConfig::from_lookup(lookup)?,
            search: SearchConfig::from_lookup(lookup)?,
            embedding: EmbeddingConfig::from_lookup(lookup)?,
            chunking: chunk_settings_from_lookup(lookup)?,
            schedule: ScheduleConfig::from_lookup(lookup)?,
        })
    }
}

impl BlobConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let raw = load_env(lookup, "AZURE_BLOB_CONN_STR")?;
        Ok(Self {
            connection: BlobConnection::parse(&raw).map_err(|source| {
                ConfigError::InvalidConnectionString {
                    variable: "AZURE_BLOB_CONN_STR".to_string(),
                    source,
                }
            })?,
            container: load_env(lookup, "AZURE_BLOB_CONTAINER")?,
        })
    }
}

impl LedgerConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let raw = load_env(lookup, "COSMOS_CONN_STR")?;
        let max_id_attempts = load_parsed(lookup, "LEDGER_MAX_ID_ATTEMPTS", DEFAULT_MAX_ID_ATTEMPTS)?;
        if max_id_attempts == 0 {
            return Err(ConfigError::InvalidValue("LEDGER_MAX_ID_ATTEMPTS".to_string()));
        }

        Ok(Self {
            connection: CosmosConnection::parse(&raw).map_err(|source| {
                ConfigError::InvalidConnectionString {
                    variable: "COSMOS_CONN_STR".to_string(),
                    source,
                }
            })?,
            database: load_env(lookup, "COSMOS_DB_NAME")?,
            container: load_env(lookup, "COSMOS_FILENAMES_CONTAINER_NAME")?,
            partition_key: load_env_optional(lookup, "COSMOS_PARTITION_KEY")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("COSMOS_PARTITION_KEY".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            max_id_attempts,
        })
    }
}

impl SearchConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: load_env(lookup, "AZURE_SEARCH_ENDPOINT")?,
            admin_key: load_env(lookup, "AZURE_SEARCH_ADMIN_KEY")?,
            index_name: load_env(lookup, "AZURE_SEARCH_INDEX_NAME")?,
            api_version: load_env_optional(lookup, "AZURE_SEARCH_API_VERSION")
                .unwrap_or_else(|| DEFAULT_SEARCH_API_VERSION.to_string()),
            layout: load_env_optional(lookup, "AZURE_SEARCH_INDEX_LAYOUT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("AZURE_SEARCH_INDEX_LAYOUT".into()))
                })
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

impl EmbeddingConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let dimension = load_parsed(lookup, "EMBEDDING_DIMENSION", DEFAULT_EMBEDDING_DIMENSION)?;
        if dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }

        Ok(Self {
            endpoint: load_env(lookup, "OPENAI_ENDPOINT")?,
            api_key: load_env(lookup, "OPENAI_KEY")?,
            deployment: load_env(lookup, "OPENAI_EMBEDDING_DEPLOYMENT_NAME")?,
            api_version: load_env(lookup, "OPENAI_API_VERSION")?,
            dimension,
        })
    }
}

impl ScheduleConfig {
    fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        let seconds: u64 = load_parsed(lookup, "INGEST_SCHEDULE_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        if seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "INGEST_SCHEDULE_INTERVAL_SECS".to_string(),
            ));
        }

        Ok(Self {
            interval: Duration::from_secs(seconds),
            run_on_startup: load_parsed(lookup, "INGEST_RUN_ON_STARTUP", true)?,
        })
    }
}

fn chunk_settings_from_lookup(lookup: Lookup<'_>) -> Result<ChunkSettings, ConfigError> {
    let settings = ChunkSettings {
        chunk_size: load_parsed(lookup, "TEXT_SPLITTER_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
        chunk_overlap: load_parsed(lookup, "TEXT_SPLITTER_CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
    };
    if settings.chunk_size == 0 {
        return Err(ConfigError::InvalidValue("TEXT_SPLITTER_CHUNK_SIZE".to_string()));
    }
    if settings.chunk_overlap >= settings.chunk_size {
        return Err(ConfigError::InvalidValue(
            "TEXT_SPLITTER_CHUNK_OVERLAP".to_string(),
        ));
    }
    Ok(settings)
}

fn load_env(lookup: Lookup<'_>, key: &str) -> Result<String, ConfigError> {
    load_env_optional(lookup, key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: FromStr>(lookup: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(lookup, key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("endpoint", &self.endpoint)
            .field("admin_key", &"<redacted>")
            .field("index_name", &self.index_name)
            .field("api_version", &self.api_version)
            .field("layout", &self.layout)
            .finish()
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Load `.env`, then build the configuration from the process environment.
pub fn init_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        container = %config.blob.container,
        blob_endpoint = %config.blob.connection.endpoint,
        ledger = %format!("{}/{}", config.ledger.database, config.ledger.container),
        index = %config.search.index_name,
        layout = ?config.search.layout,
        chunk_size = config.chunking.chunk_size,
        chunk_overlap = config.chunking.chunk_overlap,
        interval_secs = config.schedule.interval.as_secs(),
        "Loaded configuration"
    );
    Ok(config)
}
