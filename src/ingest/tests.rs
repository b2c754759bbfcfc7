use super::*;
use crate::embeddings::normalize;
use std::fs;
use tempfile::TempDir;

/// Deterministic embedder based on letter frequencies
struct LetterEmbedder {
    model: &'static str,
}

impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        self.model
    }

    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.1_f32; 8];
                for byte in text.to_lowercase().bytes().filter(u8::is_ascii_lowercase) {
                    vector[usize::from(byte - b'a') % 8] += 1.0;
                }
                normalize(&mut vector);
                vector
            })
            .collect())
    }
}

fn embedder(model: &'static str) -> Arc<dyn Embedder> {
    Arc::new(LetterEmbedder { model })
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config {
        base_dir: dir.path().join("data"),
        ..Config::default()
    };
    config.ollama.embedding_model = "letters".to_string();
    config.ollama.batch_size = 2;
    config
}

fn allowed() -> IngestConfig {
    IngestConfig {
        allowed_extensions: ["pdf", ".txt", "md"].iter().map(ToString::to_string).collect(),
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent");
    }
    fs::write(&path, content).expect("should write file");
    path.canonicalize().expect("should canonicalize")
}

#[test]
fn collect_paths_filters_by_extension() {
    let dir = TempDir::new().expect("should create temp dir");
    let docs = dir.path().join("docs");
    let txt = write(&docs, "b.txt", "texto");
    let md = write(&docs, "sub/d.md", "# título");
    write(&docs, "c.exe", "binary");
    let upper = write(dir.path(), "RCR-3.TXT", "maiúsculas");

    let missing = dir.path().join("nao-existe.pdf");
    let unsupported = dir.path().join("docs/c.exe");

    let files = collect_paths(&[docs.clone(), missing, unsupported, upper.clone()], &allowed());

    let mut expected = vec![txt, md, upper];
    expected.sort();
    assert_eq!(files, expected);
}

#[test]
fn collect_paths_deduplicates() {
    let dir = TempDir::new().expect("should create temp dir");
    let file = write(dir.path(), "a.txt", "texto");

    let files = collect_paths(&[dir.path().to_path_buf(), file.clone(), file.clone()], &allowed());
    assert_eq!(files, vec![file]);
}

#[tokio::test]
async fn empty_input_is_rejected_before_store_creation() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let inputs: Vec<PathBuf> = Vec::new();

    let err = ingest_paths(
        &config,
        &inputs,
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("should reject empty input");

    assert!(matches!(err, RagError::Input(ref message) if message.contains("Você precisa informar")));
    assert!(!config.store_path().exists());
}

#[tokio::test]
async fn unsupported_input_is_rejected_before_store_creation() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let exe = write(dir.path(), "programa.exe", "binary");

    let err = ingest_paths(
        &config,
        &[exe],
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("should reject unsupported input");

    assert!(matches!(err, RagError::Input(ref message) if message.contains("Nenhum arquivo suportado")));
    assert!(!config.store_path().exists());
}

#[tokio::test]
async fn ingestion_stores_chunks_and_manifest() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let docs = dir.path().join("docs");
    write(&docs, "rcr3.txt", "Art. 50 da RCR-3 trata de seguro de risco de engenharia.");
    write(&docs, "rcr4.md", "# RCR-4\n\nArt. 10 trata de **garantia** de execução.");
    write(&docs, "rcr5.txt", "Art. 7 trata de revisão tarifária.");

    let report = ingest_paths(
        &config,
        &[docs],
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect("should ingest");

    assert_eq!(report.files_found, 3);
    assert_eq!(report.files_converted, 3);
    assert!(report.failures.is_empty());
    assert_eq!(report.documents, 3);
    assert_eq!(report.chunks, 3);
    assert_eq!(report.embeddings_stored, 3);
    assert_eq!(report.store_path, config.store_path());

    let manifest = StoreManifest::load(&config.store_path())
        .expect("should read manifest")
        .expect("manifest should exist");
    assert_eq!(manifest.embedding_model, "letters");
    assert_eq!(manifest.embedding_dimension, 8);

    let store = VectorStore::open(&config.store_path())
        .await
        .expect("should reopen store");
    assert_eq!(store.count_embeddings().await.expect("should count"), 3);
}

#[tokio::test]
async fn conversion_failures_are_skipped_unless_fail_fast() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let broken = write(dir.path(), "quebrado.pdf", "this is not a pdf");
    let good = write(dir.path(), "bom.txt", "Cláusula 20 trata de seguros obrigatórios.");
    let inputs = [broken.clone(), good];

    let err = ingest_paths(
        &config,
        &inputs,
        IngestOptions { fail_fast: true },
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("fail-fast should abort");
    assert!(matches!(err, RagError::Conversion(_)));
    assert!(!config.store_path().exists());

    let report = ingest_paths(
        &config,
        &inputs,
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect("should ingest the readable file");

    assert_eq!(report.files_found, 2);
    assert_eq!(report.files_converted, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, broken);
    assert_eq!(report.embeddings_stored, 1);
}

#[tokio::test]
async fn nothing_converted_is_an_input_error() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let blank = write(dir.path(), "vazio.txt", "   \n\n  ");

    let err = ingest_paths(
        &config,
        &[blank],
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("should reject");

    assert!(matches!(err, RagError::Input(_)));
    assert!(!config.store_path().exists());
}

#[tokio::test]
async fn different_embedding_model_is_refused() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    StoreManifest::new("bge-m3", 1024)
        .save(&config.store_path())
        .expect("should save manifest");
    let file = write(dir.path(), "a.txt", "Art. 1 texto.");

    let err = ingest_paths(
        &config,
        &[file],
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("should refuse");

    assert!(matches!(
        err,
        RagError::EmbeddingModelMismatch { ref stored, ref configured }
            if stored == "bge-m3" && configured == "letters"
    ));
}

/// Embeds with `LetterEmbedder` but gives the last vector of every batch an extra dimension
struct RaggedEmbedder;

impl Embedder for RaggedEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }

    fn embed_documents(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = LetterEmbedder { model: "letters" }.embed_documents(texts)?;
        if let Some(last) = vectors.last_mut() {
            last.push(0.0);
        }
        Ok(vectors)
    }
}

#[tokio::test]
async fn manifest_is_written_before_the_first_append() {
    use arrow::datatypes::{DataType, Field, Schema};

    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let store_path = config.store_path();
    fs::create_dir_all(&store_path).expect("should create store dir");

    // A table with the right vector column but none of the chunk columns rejects every append
    let connection = lancedb::connect(&store_path.display().to_string())
        .execute()
        .await
        .expect("should connect");
    let schema = Arc::new(Schema::new(vec![Field::new(
        "vector",
        DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), 8),
        false,
    )]));
    connection
        .create_empty_table("chunks", schema)
        .execute()
        .await
        .expect("should create table");

    let file = write(dir.path(), "rcr3.txt", "Art. 50 da RCR-3 trata de seguro.");
    let err = ingest_paths(
        &config,
        &[file],
        IngestOptions::default(),
        &embedder("letters"),
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("append should fail");
    assert!(matches!(err, RagError::Database(_)));

    let manifest = StoreManifest::load(&store_path)
        .expect("should read manifest")
        .expect("manifest should exist even though the append failed");
    assert_eq!(manifest.embedding_model, "letters");
    assert_eq!(manifest.embedding_dimension, 8);
}

#[tokio::test]
async fn ragged_embeddings_leave_no_manifest() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&dir);
    let docs = dir.path().join("docs");
    write(&docs, "rcr3.txt", "Art. 50 da RCR-3 trata de seguro.");
    write(&docs, "rcr5.txt", "Art. 7 trata de revisão tarifária.");

    let embedder: Arc<dyn Embedder> = Arc::new(RaggedEmbedder);
    let err = ingest_paths(
        &config,
        &[docs],
        IngestOptions::default(),
        &embedder,
        &Arc::new(DocumentConverter::new()),
    )
    .await
    .expect_err("should reject mixed dimensions");
    assert!(matches!(err, RagError::Embedding(_)));

    assert!(
        StoreManifest::load(&config.store_path())
            .expect("should read manifest")
            .is_none()
    );
    let store = VectorStore::open(&config.store_path())
        .await
        .expect("should reopen store");
    assert_eq!(store.count_embeddings().await.expect("should count"), 0);
}
