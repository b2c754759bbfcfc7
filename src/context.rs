// Runtime context
// Everything a query front-end needs, built once per process

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{StoreManifest, VectorStore};
use crate::ollama::OllamaClient;
use crate::query::{MmrRetriever, OllamaGenerator, RagPipeline};
use crate::{RagError, Result};

/// Validated configuration plus the query pipeline over the persisted store
pub struct RagContext {
    config: Config,
    manifest: StoreManifest,
    pipeline: RagPipeline,
}

impl RagContext {
    /// Open the store described by `config` for querying.
    ///
    /// Fails when nothing has been ingested yet, or when the store was built
    /// with a different embedding model than the configured one.
    #[inline]
    pub async fn open(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let store_path = config.store_path();
        let manifest = StoreManifest::load(&store_path)?.ok_or_else(|| {
            RagError::Config(format!(
                "No document store found at {}. Run `antt-rag ingest <paths>` first.",
                store_path.display()
            ))
        })?;
        manifest.ensure_model(&config.ollama.embedding_model)?;

        let client = OllamaClient::new(&config.ollama)
            .map_err(|e| RagError::Config(format!("{:#}", e)))?;

        let health_client = client.clone();
        let models = [
            config.ollama.embedding_model.clone(),
            config.llm.model.clone(),
        ];
        let health = tokio::task::spawn_blocking(move || {
            let names: Vec<&str> = models.iter().map(String::as_str).collect();
            health_client.health_check(&names)
        })
        .await
        .map_err(|e| RagError::Network(e.to_string()))?;
        if let Err(e) = health {
            // Reported per question by the pipeline as well
            warn!("Ollama health check failed: {:#}", e);
        }

        let store = VectorStore::open(&store_path).await?;
        info!(
            "Opened store at {} built with {} ({} dimensions)",
            store_path.display(),
            manifest.embedding_model,
            manifest.embedding_dimension
        );

        let generator = OllamaGenerator::new(client.clone(), &config.llm);
        let retriever = MmrRetriever::new(Arc::new(client), store, config.retrieval.clone());
        let pipeline = RagPipeline::new(Box::new(retriever), Box::new(generator));

        Ok(Self {
            config,
            manifest,
            pipeline,
        })
    }

    /// Context over an already assembled pipeline
    #[inline]
    pub fn from_parts(config: Config, manifest: StoreManifest, pipeline: RagPipeline) -> Self {
        Self {
            config,
            manifest,
            pipeline,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn manifest(&self) -> &StoreManifest {
        &self.manifest
    }

    #[inline]
    pub fn pipeline(&self) -> &RagPipeline {
        &self.pipeline
    }
}
