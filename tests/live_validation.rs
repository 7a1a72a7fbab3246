use std::sync::OnceLock;

use rustyingest::{
    config::{self, Config},
    embedding,
    ledger::{CosmosLedgerStore, LedgerStore},
    pipeline,
    storage::{BlobStorageClient, ObjectStore},
};

static CONFIG: OnceLock<Config> = OnceLock::new();

fn live_config() -> &'static Config {
    CONFIG.get_or_init(|| config::init_config().expect("live tests need a complete .env"))
}

#[tokio::test]
#[ignore = "Requires live Azure services"]
async fn live_blob_listing() {
    let config = live_config();
    let client = BlobStorageClient::new(config.blob.connection.clone()).unwrap();
    let names = client
        .list(&config.blob.container)
        .await
        .expect("failed to list container");
    if let Some(first) = names.first() {
        client
            .download(&config.blob.container, first)
            .await
            .expect("listed blob should download");
    }
}

#[tokio::test]
#[ignore = "Requires live Azure services"]
async fn live_ledger_lookup() {
    let store = CosmosLedgerStore::new(&live_config().ledger).unwrap();
    let known = store
        .filename_exists("rustyingest-live-probe-does-not-exist.txt")
        .await
        .expect("ledger should answer");
    assert!(!known);
}

#[tokio::test]
#[ignore = "Requires live Azure services"]
async fn live_embedding_roundtrip() {
    let config = live_config();
    let client = embedding::get_embedding_client(&config.embedding).unwrap();
    let vectors = client
        .generate_embeddings(vec!["rusty ingest live embedding".to_string()])
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(vectors.len(), 1, "expected embedding per input chunk");
    assert_eq!(
        vectors[0].len(),
        config.embedding.dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires live Azure services"]
async fn live_similarity_search() {
    let config = live_config();
    let indexer = pipeline::build_indexer(config).unwrap();
    let hits = indexer
        .search(&config.search.index_name, "quarterly report", 3)
        .await
        .expect("search should succeed");
    assert!(hits.len() <= 3);
}
