// Ingestion pipeline
// Files -> documents -> token-window chunks -> embeddings -> vector store

#[cfg(test)]
mod tests;

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{Config, IngestConfig};
use crate::convert::{Document, DocumentConverter, filter_complex_metadata};
use crate::database::{EmbeddingRecord, StoreManifest, VectorStore};
use crate::embeddings::{Chunk, Embedder, TextSplitter};
use crate::{RagError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Abort on the first file that cannot be converted
    pub fail_fast: bool,
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_converted: usize,
    /// Files that could not be converted, with the reason
    pub failures: Vec<(PathBuf, String)>,
    pub documents: usize,
    pub chunks: usize,
    pub embeddings_stored: usize,
    pub store_path: PathBuf,
}

/// Expand the given files and directories into the supported files beneath them.
///
/// Missing paths and files the ingest allow-list rejects are reported and
/// skipped. The result is sorted and free of duplicates.
#[inline]
pub fn collect_paths<S: AsRef<Path>>(args: &[S], ingest: &IngestConfig) -> Vec<PathBuf> {
    let mut files = BTreeSet::new();

    for arg in args {
        let path = resolve(arg.as_ref());

        if path.is_dir() {
            for entry in WalkDir::new(&path).follow_links(true) {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        if ingest.accepts(entry.path()) {
                            files.insert(entry.into_path());
                        } else {
                            debug!("Skipping unsupported file {}", entry.path().display());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to walk {}: {}", path.display(), e),
                }
            }
        } else if path.is_file() && ingest.accepts(&path) {
            files.insert(path);
        } else {
            warn!("Ignoring {}", path.display());
            println!("[AVISO] Ignorado (não existe/sem suporte): {}", arg.as_ref().display());
        }
    }

    files.into_iter().collect()
}

fn resolve(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn progress_bar(len: usize, template: &str) -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(len as u64)
            .with_style(ProgressStyle::with_template(template).expect("style template is valid"))
    } else {
        ProgressBar::hidden()
    }
}

/// Convert, chunk, embed and store every supported file under `inputs`.
///
/// Input problems are detected before the store is touched, so a rejected run
/// leaves no trace on disk.
#[inline]
pub async fn ingest_paths<S: AsRef<Path>>(
    config: &Config,
    inputs: &[S],
    options: IngestOptions,
    embedder: &Arc<dyn Embedder>,
    converter: &Arc<DocumentConverter>,
) -> Result<IngestReport> {
    if inputs.is_empty() {
        return Err(RagError::Input(
            "Você precisa informar arquivos/pastas".to_string(),
        ));
    }

    let files = collect_paths(inputs, &config.ingest);
    if files.is_empty() {
        return Err(RagError::Input(
            "Nenhum arquivo suportado encontrado".to_string(),
        ));
    }

    let store_path = config.store_path();
    let manifest = StoreManifest::load(&store_path)?;
    if let Some(manifest) = &manifest {
        manifest.ensure_model(embedder.model_name())?;
    }

    let mut report = IngestReport {
        files_found: files.len(),
        store_path: store_path.clone(),
        ..IngestReport::default()
    };

    println!("🔄 Iniciando processamento...\n");
    println!("📄 Lendo e convertendo documentos...");
    let documents = convert_files(&files, options, converter, &mut report).await?;
    if documents.is_empty() {
        return Err(RagError::Input(
            "Nenhum documento pôde ser convertido".to_string(),
        ));
    }
    report.documents = documents.len();
    println!("✅ {} documento(s) carregado(s)\n", documents.len());

    println!("✂️  Dividindo em pedaços (por tokens)...");
    let chunks = split(config, documents).await?;
    report.chunks = chunks.len();
    println!("✅ {} pedaço(s) criado(s)\n", chunks.len());

    println!("🧠 Criando embeddings e salvando no banco vetorial...");
    let mut store = VectorStore::open(&store_path).await?;
    report.embeddings_stored =
        embed_and_store(config, &chunks, embedder, &mut store, manifest.is_none()).await?;

    if let Err(e) = store.optimize().await {
        warn!("Failed to optimize vector store: {}", e);
    }

    info!(
        "Ingested {} files into {} chunks ({} failures)",
        report.files_converted,
        report.chunks,
        report.failures.len()
    );
    println!("\n✅ CONCLUÍDO! Base salva em: {}", store_path.display());

    Ok(report)
}

async fn convert_files(
    files: &[PathBuf],
    options: IngestOptions,
    converter: &Arc<DocumentConverter>,
    report: &mut IngestReport,
) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for path in files {
        println!("   → Convertendo: {}", path.display());

        let task_converter = Arc::clone(converter);
        let task_path = path.clone();
        let converted = tokio::task::spawn_blocking(move || task_converter.convert(&task_path))
            .await
            .unwrap_or_else(|e| {
                Err(RagError::Conversion(format!(
                    "{}: converter crashed: {}",
                    path.display(),
                    e
                )))
            });

        match converted {
            Ok(mut converted) => {
                debug!("{} produced {} documents", path.display(), converted.len());
                report.files_converted += 1;
                documents.append(&mut converted);
            }
            Err(e) if options.fail_fast => return Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                println!("   [ERRO] Falha ao converter {}: {}", path.display(), e);
                report.failures.push((path.clone(), e.to_string()));
            }
        }
    }

    Ok(documents)
}

async fn split(config: &Config, mut documents: Vec<Document>) -> Result<Vec<Chunk>> {
    let stripped: usize = documents
        .iter_mut()
        .map(|document| filter_complex_metadata(&mut document.metadata))
        .sum();
    if stripped > 0 {
        debug!("Stripped {} complex metadata values", stripped);
    }

    let chunking = config.chunking.clone();
    tokio::task::spawn_blocking(move || {
        let splitter =
            TextSplitter::from_config(&chunking).map_err(|e| RagError::Config(format!("{:#}", e)))?;
        splitter
            .split_documents(&documents)
            .map_err(RagError::Other)
    })
    .await
    .map_err(|e| RagError::Other(e.into()))?
}

async fn embed_and_store(
    config: &Config,
    chunks: &[Chunk],
    embedder: &Arc<dyn Embedder>,
    store: &mut VectorStore,
    write_manifest: bool,
) -> Result<usize> {
    let batch_size = usize::try_from(config.ollama.batch_size)
        .unwrap_or(1)
        .max(1);
    let bar = progress_bar(chunks.len(), "{bar:40} {pos}/{len} pedaços {msg}");
    let mut manifest_pending = write_manifest;
    let mut stored = 0;

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.content.clone()).collect();
        let batch_embedder = Arc::clone(embedder);
        let vectors = tokio::task::spawn_blocking(move || batch_embedder.embed_documents(&texts))
            .await
            .map_err(|e| RagError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if vectors.len() != batch.len() {
            return Err(RagError::Embedding(format!(
                "Expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let dimension = batch_dimension(&vectors)?;

        // Rows must never reach the table without a manifest naming their model
        if manifest_pending && store.vector_dimension().is_none_or(|existing| existing == dimension)
        {
            StoreManifest::new(embedder.model_name(), dimension).save(store.path())?;
            manifest_pending = false;
        }

        let records: Vec<EmbeddingRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
            .collect();

        store.store_embeddings_batch(records).await?;
        stored += batch.len();
        bar.inc(batch.len() as u64);
    }

    bar.finish_and_clear();
    debug!("Stored {} embeddings", stored);
    Ok(stored)
}

/// The shared dimension of a batch of embeddings
fn batch_dimension(vectors: &[Vec<f32>]) -> Result<usize> {
    let dimension = vectors.first().map_or(0, Vec::len);
    if dimension == 0 {
        return Err(RagError::Embedding("Embedding model returned empty vectors".to_string()));
    }
    if let Some(bad) = vectors.iter().find(|vector| vector.len() != dimension) {
        return Err(RagError::Embedding(format!(
            "Embedding model returned vectors of {} and {} dimensions",
            dimension,
            bad.len()
        )));
    }
    Ok(dimension)
}
