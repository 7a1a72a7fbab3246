//! Azure Blob Storage REST client.

use crate::azure::{BlobConnection, BlobCredential, auth};
use crate::storage::{ObjectStore, StorageError};
use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode, Url};

const BLOB_API_VERSION: &str = "2021-08-06";

/// Lightweight HTTP client for the blob service.
pub struct BlobStorageClient {
    client: Client,
    connection: BlobConnection,
}

impl BlobStorageClient {
    /// Build a client for the account described by `connection`.
    pub fn new(connection: BlobConnection) -> Result<Self, StorageError> {
        Url::parse(&connection.endpoint)
            .map_err(|err| StorageError::InvalidUrl(format!("{}: {err}", connection.endpoint)))?;
        let client = Client::builder().user_agent("rusty-ingest/0.1").build()?;
        tracing::debug!(
            endpoint = %connection.endpoint,
            account = %connection.account_name,
            sas = matches!(connection.credential, BlobCredential::Sas(_)),
            "Initialized blob storage client"
        );
        Ok(Self { client, connection })
    }

    fn object_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.connection.endpoint)
            .map_err(|err| StorageError::InvalidUrl(err.to_string()))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| StorageError::InvalidUrl(self.connection.endpoint.clone()))?;
            path.pop_if_empty();
            for segment in segments {
                // Virtual directories in blob names stay real path separators.
                path.extend(segment.split('/'));
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        if let BlobCredential::Sas(sas) = &self.connection.credential {
            let merged = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{sas}"),
                _ => sas.clone(),
            };
            url.set_query(Some(&merged));
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, StorageError> {
        let date = auth::rfc1123_now();
        let mut request = self
            .client
            .get(url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", BLOB_API_VERSION);

        if let BlobCredential::SharedKey(key) = &self.connection.credential {
            let authorization = auth::blob_shared_key(
                "GET",
                &self.connection.account_name,
                key,
                &url,
                &[("x-ms-date", &date), ("x-ms-version", BLOB_API_VERSION)],
            );
            request = request.header(AUTHORIZATION, authorization);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl ObjectStore for BlobStorageClient {
    async fn list(&self, container: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut query = vec![("restype", "container"), ("comp", "list")];
            if let Some(marker) = marker.as_deref() {
                query.push(("marker", marker));
            }
            let url = self.object_url(&[container], &query)?;
            let response = self.get(url).await?;
            if !response.status().is_success() {
                return Err(unexpected_status(response, "Failed to list blobs").await);
            }

            let body = response.text().await?;
            let page = parse_list_response(&body)?;
            names.extend(page.names);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::debug!(container, blobs = names.len(), "Listed container");
        Ok(names)
    }

    async fn download(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        let url = self.object_url(&[container, name], &[])?;
        let response = self.get(url).await?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await?;
                tracing::debug!(container, blob = name, bytes = bytes.len(), "Downloaded blob");
                Ok(bytes.to_vec())
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(format!("{container}/{name}"))),
            _ => Err(unexpected_status(response, "Failed to download blob").await),
        }
    }
}

async fn unexpected_status(response: reqwest::Response, context: &str) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let error = StorageError::UnexpectedStatus { status, body };
    tracing::error!(error = %error, "{}", context);
    error
}

/// One page of a `List Blobs` response.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ListPage {
    pub(crate) names: Vec<String>,
    pub(crate) next_marker: Option<String>,
}

pub(crate) fn parse_list_response(xml: &str) -> Result<ListPage, StorageError> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut text = String::new();
    let mut page = ListPage::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                path.push(element.local_name().as_ref().to_vec());
                text.clear();
            }
            Ok(Event::Text(content)) => {
                let value = content
                    .unescape()
                    .map_err(|err| StorageError::InvalidListing(err.to_string()))?;
                text.push_str(&value);
            }
            Ok(Event::End(_)) => {
                let closing = path.pop();
                match closing.as_deref() {
                    Some(b"Name") if path.last().is_some_and(|parent| parent == b"Blob") => {
                        page.names.push(std::mem::take(&mut text));
                    }
                    Some(b"NextMarker") if !text.is_empty() => {
                        page.next_marker = Some(std::mem::take(&mut text));
                    }
                    _ => {}
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(StorageError::InvalidListing(format!(
                    "position {}: {err}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if !path.is_empty() {
        return Err(StorageError::InvalidListing(
            "listing ended inside an open element".to_string(),
        ));
    }

    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, MockServer};

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/" ContainerName="docs">
  <Blobs>
    <Blob><Name>a.txt</Name><Properties><Content-Length>5</Content-Length></Properties></Blob>
    <Blob><Name>reports/q1 &amp; q2.pdf</Name><Properties /></Blob>
  </Blobs>
  <NextMarker>page-2</NextMarker>
</EnumerationResults>"#;

    fn client_for(server: &MockServer, credential: BlobCredential) -> BlobStorageClient {
        BlobStorageClient::new(BlobConnection {
            account_name: "acct".into(),
            endpoint: format!("{}/acct", server.base_url()),
            credential,
        })
        .expect("client")
    }

    #[test]
    fn parses_names_and_next_marker() {
        let page = parse_list_response(PAGE).expect("listing parses");
        assert_eq!(page.names, vec!["a.txt", "reports/q1 & q2.pdf"]);
        assert_eq!(page.next_marker.as_deref(), Some("page-2"));
    }

    #[test]
    fn empty_next_marker_ends_paging() {
        let xml = "<EnumerationResults><Blobs /><NextMarker /></EnumerationResults>";
        let page = parse_list_response(xml).expect("listing parses");
        assert!(page.names.is_empty());
        assert_eq!(page.next_marker, None);
    }

    #[test]
    fn truncated_listing_is_rejected() {
        let error = parse_list_response("<EnumerationResults><Blobs><Blob>").unwrap_err();
        assert!(matches!(error, StorageError::InvalidListing(_)));
    }

    #[tokio::test]
    async fn list_sends_signed_container_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/acct/docs")
                    .query_param("restype", "container")
                    .query_param("comp", "list")
                    .header("x-ms-version", BLOB_API_VERSION)
                    .header_exists("x-ms-date")
                    .header_exists("authorization");
                then.status(200)
                    .header("content-type", "application/xml")
                    .body(
                        "<EnumerationResults><Blobs><Blob><Name>a.txt</Name></Blob>\
                         <Blob><Name>b.csv</Name></Blob></Blobs><NextMarker/></EnumerationResults>",
                    );
            })
            .await;

        let client = client_for(&server, BlobCredential::SharedKey(b"secret".to_vec()));
        let names = client.list("docs").await.expect("listing succeeds");

        mock.assert_async().await;
        assert_eq!(names, vec!["a.txt", "b.csv"]);
    }

    #[tokio::test]
    async fn download_appends_sas_and_returns_bytes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/acct/docs/reports/a.txt")
                    .query_param("sig", "abc");
                then.status(200).body("hello");
            })
            .await;

        let client = client_for(&server, BlobCredential::Sas("sv=2022-11-02&sig=abc".into()));
        let bytes = client
            .download("docs", "reports/a.txt")
            .await
            .expect("download succeeds");

        mock.assert_async().await;
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn download_maps_missing_blob_to_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/acct/docs/missing.txt");
                then.status(404).body("BlobNotFound");
            })
            .await;

        let client = client_for(&server, BlobCredential::SharedKey(b"secret".to_vec()));
        let error = client.download("docs", "missing.txt").await.unwrap_err();
        assert!(matches!(error, StorageError::NotFound(name) if name == "docs/missing.txt"));
    }

    #[tokio::test]
    async fn list_surfaces_service_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/acct/docs");
                then.status(403).body("AuthenticationFailed");
            })
            .await;

        let client = client_for(&server, BlobCredential::SharedKey(b"secret".to_vec()));
        let error = client.list("docs").await.unwrap_err();
        assert!(matches!(
            error,
            StorageError::UnexpectedStatus { status, .. } if status == StatusCode::FORBIDDEN
        ));
    }
}
