//! Cosmos DB (SQL API) backed ledger store.

use crate::azure::{CosmosConnection, auth};
use crate::config::LedgerConfig;
use crate::ledger::{LedgerError, LedgerRecord, LedgerStore, PartitionKey};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{Value, json};

const COSMOS_API_VERSION: &str = "2018-12-31";
const CONTINUATION_HEADER: &str = "x-ms-continuation";

/// Ledger store speaking the Cosmos DB REST protocol.
pub struct CosmosLedgerStore {
    pub(crate) client: Client,
    pub(crate) connection: CosmosConnection,
    pub(crate) database: String,
    pub(crate) container: String,
    pub(crate) partition_key: PartitionKey,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

impl CosmosLedgerStore {
    /// Build a store for the container named in `config`.
    pub fn new(config: &LedgerConfig) -> Result<Self, LedgerError> {
        reqwest::Url::parse(&config.connection.endpoint)
            .map_err(|err| LedgerError::InvalidUrl(format!("{}: {err}", config.connection.endpoint)))?;
        let client = Client::builder().user_agent("rusty-ingest/0.1").build()?;
        tracing::debug!(
            endpoint = %config.connection.endpoint,
            database = %config.database,
            container = %config.container,
            partition_key = ?config.partition_key,
            "Initialized Cosmos ledger client"
        );

        Ok(Self {
            client,
            connection: config.connection.clone(),
            database: config.database.clone(),
            container: config.container.clone(),
            partition_key: config.partition_key,
        })
    }

    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    fn docs_request(&self, method: Method) -> RequestBuilder {
        let link = self.collection_link();
        let date = auth::rfc1123_now();
        let token =
            auth::cosmos_master_token(&self.connection.key, method.as_str(), "docs", &link, &date);
        let url = format!("{}/{link}/docs", self.connection.endpoint.trim_end_matches('/'));

        self.client
            .request(method, url)
            .header(AUTHORIZATION, token)
            .header("x-ms-date", date)
            .header("x-ms-version", COSMOS_API_VERSION)
    }

    /// Run a single-parameter query and report whether it matched any document.
    async fn query_matches(
        &self,
        query: &str,
        parameter: &str,
        value: &str,
    ) -> Result<bool, LedgerError> {
        let body = json!({
            "query": query,
            "parameters": [{ "name": parameter, "value": value }],
        })
        .to_string();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .docs_request(Method::POST)
                .header("x-ms-documentdb-isquery", "True")
                .header("x-ms-documentdb-query-enablecrosspartition", "True")
                .header(CONTENT_TYPE, "application/query+json")
                .body(body.clone());
            if let Some(token) = &continuation {
                request = request.header(CONTINUATION_HEADER, token);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                let error = LedgerError::UnexpectedStatus { status, body };
                tracing::error!(query, error = %error, "Ledger query failed");
                return Err(error);
            }

            let next = response
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string);
            let page: QueryPage = response.json().await?;

            if !page.documents.is_empty() {
                return Ok(true);
            }
            match next {
                Some(token) => continuation = Some(token),
                None => return Ok(false),
            }
        }
    }
}

#[async_trait]
impl LedgerStore for CosmosLedgerStore {
    async fn filename_exists(&self, filename: &str) -> Result<bool, LedgerError> {
        self.query_matches(
            "SELECT c.id FROM c WHERE c.filename = @filename",
            "@filename",
            filename,
        )
        .await
    }

    async fn id_exists(&self, id: &str) -> Result<bool, LedgerError> {
        self.query_matches("SELECT c.id FROM c WHERE c.id = @id", "@id", id)
            .await
    }

    async fn upsert(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        let partition = json!([self.partition_key.value_of(record)]).to_string();
        let response = self
            .docs_request(Method::POST)
            .header("x-ms-documentdb-is-upsert", "True")
            .header("x-ms-documentdb-partitionkey", partition)
            .json(record)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::debug!(id = %record.id, file = %record.filename, "Ledger record upserted");
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = LedgerError::UnexpectedStatus { status, body };
            tracing::error!(file = %record.filename, error = %error, "Ledger upsert failed");
            Err(error)
        }
    }
}
