//! HTTP client wrapper for Azure AI Search.

use crate::config::SearchConfig;
use crate::search::VectorIndex;
use crate::search::schema::{IndexDefinition, IndexLayout};
use crate::search::types::{
    IndexBatchResponse, IndexEntry, SearchError, SearchHit, SearchResponse, UpsertSummary,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde_json::json;

/// Lightweight HTTP client for search index operations.
pub struct AzureSearchService {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) api_version: String,
    pub(crate) layout: IndexLayout,
}

/// Documents accepted by the service in one indexing request.
pub(crate) const MAX_BATCH_DOCUMENTS: usize = 1000;
/// Request body budget, kept below the service's 16 MB payload limit.
pub(crate) const MAX_BATCH_BYTES: usize = 15 * 1024 * 1024;

/// One encoded `docs/index` request body.
pub(crate) struct EncodedBatch {
    pub(crate) documents: usize,
    pub(crate) body: Vec<u8>,
}

#[derive(Serialize)]
struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    #[serde(flatten)]
    entry: &'a IndexEntry,
}

impl AzureSearchService {
    /// Construct a client for the service described by `config`.
    pub fn new(config: &SearchConfig) -> Result<Self, SearchError> {
        let client = Client::builder().user_agent("rusty-ingest/0.1").build()?;
        let base_url = normalize_base_url(&config.endpoint).map_err(SearchError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            api_version = %config.api_version,
            layout = ?config.layout,
            "Initialized Azure AI Search client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: config.admin_key.clone(),
            api_version: config.api_version.clone(),
            layout: config.layout,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        self.client
            .request(method, url)
            .query(&[("api-version", self.api_version.as_str())])
            .header("api-key", &self.api_key)
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), SearchError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            Err(failed_response(response, "Search request failed").await)
        }
    }
}

#[async_trait]
impl VectorIndex for AzureSearchService {
    async fn upsert_documents(
        &self,
        index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertSummary, SearchError> {
        if entries.is_empty() {
            return Ok(UpsertSummary::default());
        }

        let total = entries.len();
        let batches = encode_batches(&entries, MAX_BATCH_DOCUMENTS, MAX_BATCH_BYTES)?;
        let batch_count = batches.len();
        let mut succeeded = 0;
        let mut failed = 0;
        let mut first_error: Option<String> = None;

        for (number, batch) in batches.into_iter().enumerate() {
            let response = self
                .request(Method::POST, &format!("indexes/{index}/docs/index"))
                .header(CONTENT_TYPE, "application/json")
                .body(batch.body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(failed_response(response, "Document upload failed").await);
            }

            let results: IndexBatchResponse = response.json().await?;
            let rejected: Vec<_> = results.value.iter().filter(|result| !result.status).collect();
            if status == StatusCode::MULTI_STATUS || !rejected.is_empty() {
                failed += rejected.len();
                succeeded += batch.documents - rejected.len();
                if first_error.is_none() {
                    first_error = Some(
                        rejected
                            .first()
                            .map(|result| {
                                format!(
                                    "{}: {}",
                                    result.key,
                                    result.error_message.as_deref().unwrap_or("unknown error")
                                )
                            })
                            .unwrap_or_else(|| "partial success reported".to_string()),
                    );
                }
            } else {
                succeeded += batch.documents;
            }
            tracing::debug!(
                index,
                batch = number + 1,
                of = batch_count,
                documents = batch.documents,
                "Upload batch sent"
            );
        }

        if let Some(first_error) = first_error {
            let error = SearchError::PartialFailure {
                failed,
                total,
                first_error,
            };
            tracing::error!(index, succeeded, error = %error, "Document upload partially failed");
            return Err(error);
        }

        tracing::debug!(index, documents = total, batches = batch_count, "Documents uploaded");
        Ok(UpsertSummary { succeeded })
    }

    async fn document_exists(&self, index: &str, key: &str) -> Result<bool, SearchError> {
        let response = self
            .request(Method::GET, &format!("indexes/{index}/docs/{key}"))
            .query(&[("$select", "id")])
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(failed_response(response, "Document lookup failed").await),
        }
    }

    async fn search(
        &self,
        index: &str,
        vector: Vec<f32>,
        k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let body = json!({
            "top": k,
            "vectorQueries": [{
                "kind": "vector",
                "vector": vector,
                "k": k,
                "fields": self.layout.vector_field(),
            }],
        });

        let response = self
            .request(Method::POST, &format!("indexes/{index}/docs/search"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(failed_response(response, "Vector search failed").await);
        }

        let SearchResponse { value } = response.json().await?;
        tracing::debug!(index, hits = value.len(), "Vector search completed");
        Ok(value)
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchError> {
        let response = self
            .request(Method::PUT, &format!("indexes/{}", definition.name))
            .json(definition)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(index = %definition.name, "Index created or updated");
        })
        .await
    }
}

/// Encode entries as `{"value":[...]}` bodies holding at most `max_documents` actions and,
/// unless a single action is larger, at most `max_bytes` bytes.
pub(crate) fn encode_batches(
    entries: &[IndexEntry],
    max_documents: usize,
    max_bytes: usize,
) -> Result<Vec<EncodedBatch>, SearchError> {
    const OPEN: &[u8] = br#"{"value":["#;
    const CLOSE: &[u8] = b"]}";

    let mut batches = Vec::new();
    let mut current = EncodedBatch {
        documents: 0,
        body: OPEN.to_vec(),
    };

    for entry in entries {
        let action = serde_json::to_vec(&IndexAction {
            action: "mergeOrUpload",
            entry,
        })?;
        let projected = current.body.len() + action.len() + 1 + CLOSE.len();
        if current.documents > 0
            && (current.documents == max_documents.max(1) || projected > max_bytes)
        {
            current.body.extend_from_slice(CLOSE);
            batches.push(std::mem::replace(
                &mut current,
                EncodedBatch {
                    documents: 0,
                    body: OPEN.to_vec(),
                },
            ));
        }
        if current.documents > 0 {
            current.body.push(b',');
        }
        current.body.extend_from_slice(&action);
        current.documents += 1;
    }

    if current.documents > 0 {
        current.body.extend_from_slice(CLOSE);
        batches.push(current);
    }
    Ok(batches)
}

async fn failed_response(response: reqwest::Response, context: &str) -> SearchError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = SearchError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "{}", context);
    error
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
