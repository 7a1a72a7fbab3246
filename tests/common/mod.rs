#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use docx_rs::{Docx, Paragraph, Run};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use rustyingest::{
    embedding::{DeterministicEmbeddingClient, EmbeddingClient, EmbeddingClientError},
    ledger::{Ledger, LedgerError, LedgerRecord, LedgerStore},
    pipeline::IngestionPipeline,
    processing::{ChunkSettings, IndexingService, IndexingSettings},
    search::{
        IndexDefinition, IndexEntry, IndexLayout, SearchError, SearchHit, UpsertSummary,
        VectorIndex,
    },
    storage::{ObjectStore, StorageError},
};

pub const CONTAINER: &str = "inbox";
pub const INDEX: &str = "docs";
pub const DIMENSION: usize = 8;

/// Container contents plus a log of every call.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    pub files: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    pub downloads: Arc<Mutex<Vec<String>>>,
    pub fail_listing: Arc<AtomicBool>,
    pub fail_downloads: Arc<Mutex<HashSet<String>>>,
}

impl MemoryObjectStore {
    pub fn with_files(files: &[(&str, Vec<u8>)]) -> Self {
        let store = Self::default();
        for (name, bytes) in files {
            store.put(name, bytes.clone());
        }
        store
    }

    pub fn put(&self, name: &str, bytes: Vec<u8>) {
        self.files.lock().unwrap().push((name.to_string(), bytes));
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, _container: &str) -> Result<Vec<String>, StorageError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(StorageError::InvalidListing("injected failure".into()));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn download(&self, container: &str, name: &str) -> Result<Vec<u8>, StorageError> {
        self.downloads.lock().unwrap().push(name.to_string());
        if self.fail_downloads.lock().unwrap().contains(name) {
            return Err(StorageError::NotFound(format!("{container}/{name}")));
        }
        self.files
            .lock()
            .unwrap()
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{container}/{name}")))
    }
}

/// Ledger records with switchable lookup and write failures.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    pub records: Arc<Mutex<Vec<LedgerRecord>>>,
    pub lookups: Arc<AtomicUsize>,
    pub fail_lookups: Arc<AtomicBool>,
    /// Lookups answered before the ledger starts failing.
    pub fail_after_lookups: Arc<Mutex<Option<usize>>>,
    pub fail_upserts: Arc<AtomicBool>,
}

impl MemoryLedgerStore {
    pub fn filenames(&self) -> Vec<String> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .map(|record| record.filename.clone())
            .collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn filename_exists(&self, filename: &str) -> Result<bool, LedgerError> {
        let attempt = self.lookups.fetch_add(1, Ordering::SeqCst) + 1;
        let past_limit = self
            .fail_after_lookups
            .lock()
            .unwrap()
            .is_some_and(|limit| attempt > limit);
        if self.fail_lookups.load(Ordering::SeqCst) || past_limit {
            return Err(LedgerError::Store("ledger offline".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|record| record.filename == filename))
    }

    async fn id_exists(&self, id: &str) -> Result<bool, LedgerError> {
        Ok(self.records.lock().unwrap().iter().any(|record| record.id == id))
    }

    async fn upsert(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        if self.fail_upserts.load(Ordering::SeqCst) {
            return Err(LedgerError::Store("write rejected".into()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Index that keeps accepted entries and rejects batches for chosen source files.
#[derive(Clone, Default)]
pub struct MemoryIndex {
    pub entries: Arc<Mutex<Vec<IndexEntry>>>,
    pub reject_files: Arc<Mutex<HashSet<String>>>,
}

impl MemoryIndex {
    pub fn source_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(source_file)
            .collect();
        files.dedup();
        files
    }
}

fn source_file(entry: &IndexEntry) -> Option<String> {
    match entry {
        IndexEntry::Standard { metadata, .. } => serde_json::from_str::<serde_json::Value>(metadata)
            .ok()?
            .get("file_name")?
            .as_str()
            .map(str::to_string),
        IndexEntry::Titled { .. } => None,
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert_documents(
        &self,
        _index: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<UpsertSummary, SearchError> {
        let rejected = self.reject_files.lock().unwrap().clone();
        if let Some(file) = entries
            .iter()
            .filter_map(source_file)
            .find(|file| rejected.contains(file))
        {
            return Err(SearchError::PartialFailure {
                failed: entries.len(),
                total: entries.len(),
                first_error: format!("{file} rejected"),
            });
        }

        let succeeded = entries.len();
        self.entries.lock().unwrap().extend(entries);
        Ok(UpsertSummary { succeeded })
    }

    async fn document_exists(&self, _index: &str, key: &str) -> Result<bool, SearchError> {
        Ok(self.entries.lock().unwrap().iter().any(|entry| entry.id() == key))
    }

    async fn search(
        &self,
        _index: &str,
        _vector: Vec<f32>,
        _k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Ok(Vec::new())
    }

    async fn create_index(&self, _definition: &IndexDefinition) -> Result<(), SearchError> {
        Ok(())
    }
}

/// Deterministic embedder that counts the texts it was asked to embed.
#[derive(Clone, Default)]
pub struct CountingEmbedder {
    pub texts: Arc<AtomicUsize>,
}

#[async_trait]
impl EmbeddingClient for CountingEmbedder {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        DeterministicEmbeddingClient::new(DIMENSION)
            .generate_embeddings(texts)
            .await
    }
}

/// Handles onto every fake behind a pipeline.
#[derive(Clone, Default)]
pub struct Harness {
    pub storage: MemoryObjectStore,
    pub ledger: MemoryLedgerStore,
    pub index: MemoryIndex,
    pub embedder: CountingEmbedder,
}

impl Harness {
    pub fn with_files(files: &[(&str, Vec<u8>)]) -> Self {
        Self {
            storage: MemoryObjectStore::with_files(files),
            ..Self::default()
        }
    }

    pub fn pipeline(&self) -> IngestionPipeline {
        let indexer = IndexingService::new(
            Box::new(self.embedder.clone()),
            Box::new(self.index.clone()),
            IndexingSettings {
                chunking: ChunkSettings::default(),
                dimension: DIMENSION,
                layout: IndexLayout::Standard,
                max_prefix_attempts: 4,
            },
        );
        let ledger: Ledger<Box<dyn LedgerStore>> = Ledger::new(Box::new(self.ledger.clone()), 4);
        IngestionPipeline::new(
            Box::new(self.storage.clone()),
            ledger,
            indexer,
            CONTAINER,
            INDEX,
        )
    }
}

/// Single-font PDF with one line of text per page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// DOCX package with one paragraph per line.
pub fn docx_with_paragraphs(lines: &[&str]) -> Vec<u8> {
    let docx = lines.iter().fold(Docx::new(), |docx, line| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*line)))
    });
    let mut buffer = std::io::Cursor::new(Vec::new());
    docx.build().pack(&mut buffer).unwrap();
    buffer.into_inner()
}
