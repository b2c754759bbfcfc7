#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// Integration tests for the append-only store across ingestion runs
use antt_rag::RagError;
use antt_rag::config::Config;
use antt_rag::convert::DocumentConverter;
use antt_rag::database::{StoreManifest, VectorStore};
use antt_rag::embeddings::{Embedder, normalize};
use antt_rag::ingest::{IngestOptions, ingest_paths};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct LengthEmbedder {
    dimension: usize,
}

impl Embedder for LengthEmbedder {
    fn model_name(&self) -> &str {
        "length-test"
    }

    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector: Vec<f32> = (0..self.dimension)
                    .map(|i| ((text.len() + i) % 7) as f32 + 1.0)
                    .collect();
                normalize(&mut vector);
                vector
            })
            .collect())
    }
}

fn setup() -> (TempDir, Config, Vec<PathBuf>) {
    let dir = TempDir::new().expect("should create temp dir");
    let mut config = Config {
        base_dir: dir.path().join("data"),
        ..Config::default()
    };
    config.ollama.embedding_model = "length-test".to_string();

    let docs = dir.path().join("docs");
    std::fs::create_dir_all(&docs).expect("should create docs dir");
    std::fs::write(docs.join("rcr2.txt"), "Art. 3 da RCR-2 define infrações.")
        .expect("should write");
    std::fs::write(docs.join("rcr4.txt"), "Art. 9 da RCR-4 trata de garantias.")
        .expect("should write");

    (dir, config, vec![docs])
}

async fn run(config: &Config, inputs: &[PathBuf], dimension: usize) -> antt_rag::Result<usize> {
    let embedder: Arc<dyn Embedder> = Arc::new(LengthEmbedder { dimension });
    ingest_paths(
        config,
        inputs,
        IngestOptions::default(),
        &embedder,
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .map(|report| report.embeddings_stored)
}

#[tokio::test]
async fn reingesting_appends_duplicates() {
    let (_dir, config, inputs) = setup();

    assert_eq!(run(&config, &inputs, 16).await.expect("first run"), 2);
    let first_manifest = StoreManifest::load(&config.store_path())
        .expect("should read manifest")
        .expect("manifest should exist");

    assert_eq!(run(&config, &inputs, 16).await.expect("second run"), 2);
    let second_manifest = StoreManifest::load(&config.store_path())
        .expect("should read manifest")
        .expect("manifest should exist");

    let store = VectorStore::open(&config.store_path())
        .await
        .expect("should open store");
    assert_eq!(store.count_embeddings().await.expect("should count"), 4);
    assert_eq!(store.vector_dimension(), Some(16));

    // Written once, on the first ingestion
    assert_eq!(first_manifest, second_manifest);
    assert_eq!(first_manifest.embedding_dimension, 16);
}

#[tokio::test]
async fn duplicate_entries_are_all_searchable() {
    let (_dir, config, inputs) = setup();
    run(&config, &inputs, 16).await.expect("first run");
    run(&config, &inputs, 16).await.expect("second run");

    let store = VectorStore::open(&config.store_path())
        .await
        .expect("should open store");
    let query = LengthEmbedder { dimension: 16 }
        .embed_query("Art. 3 da RCR-2 define infrações.")
        .expect("should embed");
    let results = store
        .search_candidates(&query, 10)
        .await
        .expect("should search");

    assert_eq!(results.len(), 4);
    let exact = results
        .iter()
        .filter(|result| result.chunk_metadata.content == "Art. 3 da RCR-2 define infrações.")
        .count();
    assert_eq!(exact, 2);
}

#[tokio::test]
async fn changed_dimension_is_rejected() {
    let (_dir, config, inputs) = setup();
    run(&config, &inputs, 16).await.expect("first run");

    let err = run(&config, &inputs, 24)
        .await
        .expect_err("should reject other dimension");
    assert!(matches!(err, RagError::Database(_)));

    let store = VectorStore::open(&config.store_path())
        .await
        .expect("should open store");
    assert_eq!(store.count_embeddings().await.expect("should count"), 2);
}
