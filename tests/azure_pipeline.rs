use std::collections::HashMap;

use httpmock::{
    Method::{GET, POST},
    MockServer,
};
use regex::Regex;
use rustyingest::{config::Config, pipeline::IngestionPipeline};
use serde_json::json;

fn config_for(server: &MockServer) -> Config {
    let base = server.base_url();
    let vars: HashMap<&str, String> = HashMap::from([
        (
            "AZURE_BLOB_CONN_STR",
            format!("BlobEndpoint={base}/devacct;SharedAccessSignature=sv=2021-08-06&sig=abc"),
        ),
        ("AZURE_BLOB_CONTAINER", "inbox".to_string()),
        (
            "COSMOS_CONN_STR",
            format!("AccountEndpoint={base}/;AccountKey=c2VjcmV0;"),
        ),
        ("COSMOS_DB_NAME", "ingest".to_string()),
        ("COSMOS_FILENAMES_CONTAINER_NAME", "files".to_string()),
        ("AZURE_SEARCH_ENDPOINT", base.clone()),
        ("AZURE_SEARCH_ADMIN_KEY", "admin-key".to_string()),
        ("AZURE_SEARCH_INDEX_NAME", "docs".to_string()),
        ("OPENAI_ENDPOINT", base.clone()),
        ("OPENAI_KEY", "openai-key".to_string()),
        ("OPENAI_EMBEDDING_DEPLOYMENT_NAME", "embed".to_string()),
        ("OPENAI_API_VERSION", "2024-02-01".to_string()),
        ("EMBEDDING_DIMENSION", "3".to_string()),
    ]);
    Config::from_lookup(&|key| vars.get(key).cloned()).unwrap()
}

#[tokio::test]
async fn run_against_azure_rest_endpoints() {
    let server = MockServer::start_async().await;
    let docs_path = Regex::new(r"^/dbs/ingest/colls/files/docs$").unwrap();

    let list = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/devacct/inbox")
                .query_param("comp", "list")
                .query_param("sig", "abc");
            then.status(200).header("content-type", "application/xml").body(
                "<EnumerationResults><Blobs><Blob><Name>a.txt</Name></Blob>\
                 <Blob><Name>b.csv</Name></Blob></Blobs><NextMarker/></EnumerationResults>",
            );
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path("/devacct/inbox/a.txt");
            then.status(200).body("Quarterly revenue grew in every region.");
        })
        .await;
    let queries = server
        .mock_async({
            let docs_path = docs_path.clone();
            move |when, then| {
                when.method(POST)
                    .path_matches(docs_path)
                    .header("x-ms-documentdb-isquery", "True");
                then.status(200).json_body(json!({ "Documents": [], "_count": 0 }));
            }
        })
        .await;
    let ledger_write = server
        .mock_async(move |when, then| {
            when.method(POST)
                .path_matches(docs_path)
                .header("x-ms-documentdb-is-upsert", "True")
                .body_contains(r#""filename":"a.txt""#);
            then.status(201).json_body(json!({}));
        })
        .await;
    let embeddings = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/openai/deployments/embed/embeddings")
                .query_param("api-version", "2024-02-01");
            then.status(200).json_body(json!({
                "data": [{ "index": 0, "embedding": [0.25, 0.5, 0.75] }]
            }));
        })
        .await;
    let index_write = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/indexes/docs/docs/index")
                .query_param("api-version", "2023-11-01")
                .header("api-key", "admin-key")
                .body_contains("Quarterly revenue grew in every region.");
            then.status(200).json_body(json!({
                "value": [{ "key": "k", "status": true, "errorMessage": null, "statusCode": 201 }]
            }));
        })
        .await;

    let pipeline = IngestionPipeline::from_config(&config_for(&server)).unwrap();
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.indexed, vec!["a.txt".to_string()]);
    assert_eq!(report.skipped_unsupported, vec!["b.csv".to_string()]);
    list.assert_async().await;
    download.assert_async().await;
    embeddings.assert_async().await;
    index_write.assert_async().await;
    // Two filename lookups plus one id probe.
    queries.assert_hits_async(3).await;
    ledger_write.assert_async().await;
}
