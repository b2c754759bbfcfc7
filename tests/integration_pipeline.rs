#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end tests: real conversion, chunking and LanceDB with local fakes for the models
use antt_rag::RagError;
use antt_rag::config::Config;
use antt_rag::context::RagContext;
use antt_rag::convert::DocumentConverter;
use antt_rag::database::{StoreManifest, VectorStore};
use antt_rag::embeddings::{Embedder, normalize};
use antt_rag::ingest::{IngestOptions, ingest_paths};
use antt_rag::query::{
    Generator, INSUFFICIENT_CONTEXT_ANSWER, MmrRetriever, QueryError, RagPipeline,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Bag-of-words hashed into a small dense vector
struct HashingEmbedder;

impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing-test"
    }

    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0_f32; 32];
                for word in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
                    if word.is_empty() {
                        continue;
                    }
                    let bucket = word
                        .bytes()
                        .fold(7_usize, |hash, byte| hash.wrapping_mul(31).wrapping_add(usize::from(byte)));
                    vector[bucket % 32] += 1.0;
                }
                vector[0] += 0.01;
                normalize(&mut vector);
                vector
            })
            .collect())
    }
}

/// Answers with the context section of the prompt
struct ContextEchoGenerator {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Generator for ContextEchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let context = prompt
            .split_once("Contexto:\n")
            .and_then(|(_, rest)| rest.split_once("\n\nPergunta do usuário:"))
            .map(|(context, _)| context.to_string())
            .unwrap_or_default();
        Ok(format!("Segundo os documentos: {}", context))
    }
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config {
        base_dir: dir.path().join("data"),
        ..Config::default()
    };
    config.ollama.embedding_model = "hashing-test".to_string();
    config
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("should write document");
    path.canonicalize().expect("should canonicalize")
}

async fn pipeline(config: &Config, calls: &Arc<AtomicUsize>) -> RagPipeline {
    let store = VectorStore::open(&config.store_path())
        .await
        .expect("should open store");
    let retriever = MmrRetriever::new(Arc::new(HashingEmbedder), store, config.retrieval.clone());
    RagPipeline::new(
        Box::new(retriever),
        Box::new(ContextEchoGenerator {
            calls: Arc::clone(calls),
        }),
    )
}

#[tokio::test]
async fn ingested_article_is_cited() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let rcr3 = write(
        &dir,
        "rcr3.txt",
        "Art. 50 da RCR-3 trata de seguro de risco de engenharia.",
    );
    write(
        &dir,
        "rcr5.md",
        "# RCR-5\n\nArt. 12 da RCR-5 trata de revisão tarifária ordinária.",
    );

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder);
    let report = ingest_paths(
        &config,
        &[dir.path().to_path_buf()],
        IngestOptions::default(),
        &embedder,
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect("should ingest");
    assert_eq!(report.files_converted, 2);

    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = pipeline(&config, &calls).await;
    let result = pipeline
        .ask("O que diz o art. 50 da RCR-3?")
        .await
        .expect("should answer");

    let rcr3 = rcr3.display().to_string();
    assert!(
        result.sources.iter().any(|source| source.source == rcr3),
        "sources should cite {rcr3}: {:?}",
        result.sources
    );
    assert!(result.answer.to_lowercase().contains("art. 50"));
    assert!(result.answer.contains("RCR-3"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_store_gives_the_fallback_answer() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);

    let calls = Arc::new(AtomicUsize::new(0));
    let pipeline = pipeline(&config, &calls).await;
    let result = pipeline.ask("seguro").await.expect("should answer");

    assert_eq!(result.answer, INSUFFICIENT_CONTEXT_ANSWER);
    assert!(result.sources.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn opening_without_a_store_asks_for_ingestion() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);

    let Err(err) = RagContext::open(config).await else {
        panic!("should fail without a store");
    };
    assert!(matches!(err, RagError::Config(ref message) if message.contains("ingest")));
}

#[tokio::test]
async fn opening_with_another_embedding_model_fails() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    StoreManifest::new("bge-m3", 1024)
        .save(&config.store_path())
        .expect("should save manifest");

    let Err(err) = RagContext::open(config).await else {
        panic!("should refuse a mismatched store");
    };
    assert!(matches!(
        err,
        RagError::EmbeddingModelMismatch { ref stored, ref configured }
            if stored == "bge-m3" && configured == "hashing-test"
    ));
}
