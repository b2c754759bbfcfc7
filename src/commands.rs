use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::context::RagContext;
use crate::convert::DocumentConverter;
use crate::database::{StoreManifest, VectorStore};
use crate::embeddings::Embedder;
use crate::frontends::{WebServer, cli, run_query_loop};
use crate::ingest::{IngestOptions, IngestReport, ingest_paths};
use crate::ollama::{OllamaClient, VisionTranscriber};
use crate::{RagError, Result};

fn ollama_client(config: &Config) -> Result<OllamaClient> {
    OllamaClient::new(&config.ollama).map_err(|e| RagError::Config(format!("{:#}", e)))
}

/// Ingest files and directories into the vector store
#[inline]
pub async fn ingest(config: &Config, paths: &[PathBuf], fail_fast: bool) -> Result<IngestReport> {
    let client = ollama_client(config)?;
    let transcriber = VisionTranscriber::new(client.clone(), config.llm.vision_model.clone());
    let converter = Arc::new(DocumentConverter::new().with_transcriber(Arc::new(transcriber)));
    let embedder: Arc<dyn Embedder> = Arc::new(client);

    let report = ingest_paths(
        config,
        paths,
        IngestOptions { fail_fast },
        &embedder,
        &converter,
    )
    .await?;

    if !report.failures.is_empty() {
        println!("\n⚠️  {} arquivo(s) não puderam ser convertidos:", report.failures.len());
        for (path, reason) in &report.failures {
            println!("   - {}: {}", path.display(), reason);
        }
    }

    Ok(report)
}

/// Interactive question loop on stdin/stdout
#[inline]
pub async fn query(config: Config) -> Result<()> {
    println!("🔄 Carregando sistema RAG...\n");
    println!("📂 Conectando ao banco de dados...");
    println!("🤖 Conectando ao modelo {} (Ollama)...", config.llm.model);
    let context = RagContext::open(config).await?;

    let input = BufReader::new(tokio::io::stdin());
    let mut output = std::io::stdout();

    // The Ctrl-C handler is installed before the first prompt is shown
    tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, leaving the query loop");
            cli::print_farewell(&mut std::io::stdout())
        }
        result = run_query_loop(context.pipeline(), input, &mut output) => result,
    }
}

/// Serve the question form over HTTP
#[inline]
pub async fn web(mut config: Config, bind: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(bind) = bind {
        config.web.bind = bind;
    }
    if let Some(port) = port {
        config.web.port = port;
    }

    let web_config = config.web.clone();
    let context = Arc::new(RagContext::open(config).await?);
    WebServer::new(&web_config, context)?.serve().await
}

/// Show where the store lives, how it was built and whether Ollama answers
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    let store_path = config.store_path();

    println!("📊 ANTT RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🗂️  Data directory: {}", config.get_base_dir().display());
    println!("🔍 Vector store: {}", store_path.display());

    match StoreManifest::load(&store_path) {
        Ok(Some(manifest)) => {
            println!("   📋 Embedding model: {}", manifest.embedding_model);
            println!("   🔢 Dimension: {}", manifest.embedding_dimension);
            println!("   🕒 Created: {}", manifest.created_at);
            if let Err(e) = manifest.ensure_model(&config.ollama.embedding_model) {
                println!("   ⚠️  {}", e);
            }

            match VectorStore::open(&store_path).await {
                Ok(store) => match store.count_embeddings().await {
                    Ok(count) => println!("   📦 Chunks stored: {}", count),
                    Err(e) => println!("   ❌ Failed to count chunks - {}", e),
                },
                Err(e) => println!("   ❌ LanceDB: Failed to open - {}", e),
            }
        }
        Ok(None) => println!("   💤 Empty. Run `antt-rag ingest <paths>` first."),
        Err(e) => println!("   ❌ Manifest unreadable - {}", e),
    }

    println!();
    println!("🤖 Ollama Status:");
    let client = ollama_client(config)?;
    let models = [
        config.ollama.embedding_model.clone(),
        config.llm.model.clone(),
        config.llm.vision_model.clone(),
    ];
    let health = tokio::task::spawn_blocking(move || {
        let names: Vec<&str> = models.iter().map(String::as_str).collect();
        client.health_check(&names)
    })
    .await
    .map_err(|e| RagError::Other(e.into()))?;

    match health {
        Ok(()) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            println!("   📋 Embedding model: {}", config.ollama.embedding_model);
            println!("   💬 Language model: {}", config.llm.model);
            println!("   🖼️  Vision model: {}", config.llm.vision_model);
        }
        Err(e) => {
            warn!("Ollama health check failed: {:#}", e);
            println!("   ⚠️  Ollama: Unavailable or missing models - {:#}", e);
        }
    }

    Ok(())
}

/// Print a fatal error the way the front-ends report failures
#[inline]
pub fn report_error(e: &RagError) {
    error!("{}", e);
    match e {
        RagError::Input(message) => println!("❌ {}", message),
        other => println!("❌ Erro: {}", other),
    }
}
