use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::mmr::mmr_select;
use super::{QueryError, RetrievedChunk};
use crate::config::RetrievalConfig;
use crate::database::VectorStore;
use crate::embeddings::Embedder;

/// Finds the chunks a question should be answered from
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Ranked chunks, most useful first. Empty when nothing is stored.
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, QueryError>;
}

/// Nearest-neighbour search followed by maximal-marginal-relevance re-ranking
pub struct MmrRetriever {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    config: RetrievalConfig,
}

impl MmrRetriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, store: VectorStore, config: RetrievalConfig) -> Self {
        Self {
            embedder,
            store,
            config,
        }
    }
}

#[async_trait]
impl Retriever for MmrRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, QueryError> {
        let embedder = Arc::clone(&self.embedder);
        let text = question.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed_query(&text))
            .await
            .map_err(|e| QueryError::Retrieval(format!("Embedding task failed: {}", e)))?
            .map_err(|e| QueryError::Retrieval(format!("Failed to embed question: {:#}", e)))?;

        let candidates = self
            .store
            .search_candidates(&query_vector, self.config.fetch_k)
            .await?;

        if candidates.is_empty() {
            debug!("Vector store returned no candidates");
            return Ok(Vec::new());
        }

        let vectors: Vec<Vec<f32>> = candidates.iter().map(|c| c.vector.clone()).collect();
        let picked = mmr_select(&query_vector, &vectors, self.config.k, self.config.lambda);

        debug!(
            "MMR picked {} of {} candidates",
            picked.len(),
            candidates.len()
        );

        Ok(picked
            .into_iter()
            .filter_map(|index| candidates.get(index))
            .map(|candidate| RetrievedChunk {
                content: candidate.chunk_metadata.content.clone(),
                source: candidate.chunk_metadata.source.clone(),
                page: candidate.chunk_metadata.page,
                score: candidate.similarity_score,
            })
            .collect())
    }
}
