// LanceDB vector database module
// Handles vector storage and similarity search for embeddings


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::embeddings::Chunk;
use crate::{RagError, Result};

/// File written next to the chunks table describing how it was built
pub const MANIFEST_FILE: &str = "manifest.json";

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// L2-normalized embedding of `metadata.content`
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Metadata for a chunk stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub chunk_id: String,
    /// Absolute path of the source file
    pub source: String,
    /// Page, slide or sheet number when known
    pub page: Option<u32>,
    pub content_type: String,
    /// The actual text content of the chunk
    pub content: String,
    pub token_count: u32,
    /// Index of this chunk within its document
    pub chunk_index: u32,
    /// Scalar document attributes, stored as a JSON object
    pub extra: BTreeMap<String, Value>,
    pub created_at: String,
}

impl EmbeddingRecord {
    /// Pair a chunk with its embedding, assigning fresh identifiers
    #[inline]
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector,
            metadata: ChunkMetadata {
                chunk_id: Uuid::new_v4().to_string(),
                source: chunk.metadata.source.clone(),
                page: chunk.metadata.page,
                content_type: chunk.metadata.content_type.clone(),
                content: chunk.content.clone(),
                token_count: u32::try_from(chunk.token_count).unwrap_or(u32::MAX),
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                extra: chunk.metadata.extra.clone(),
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }
}

/// Identity of the embedding space a store was built in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreManifest {
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub created_at: String,
}

impl StoreManifest {
    #[inline]
    pub fn new(embedding_model: impl Into<String>, embedding_dimension: usize) -> Self {
        Self {
            embedding_model: embedding_model.into(),
            embedding_dimension,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[inline]
    pub fn path(store_dir: &Path) -> PathBuf {
        store_dir.join(MANIFEST_FILE)
    }

    /// Read the manifest of `store_dir`, `None` when the store has none yet
    #[inline]
    pub fn load(store_dir: &Path) -> Result<Option<Self>> {
        let path = Self::path(store_dir);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let manifest = serde_json::from_str(&content).map_err(|e| {
            RagError::Database(format!("Invalid store manifest {}: {}", path.display(), e))
        })?;

        debug!("Loaded store manifest from {}", path.display());
        Ok(Some(manifest))
    }

    #[inline]
    pub fn save(&self, store_dir: &Path) -> Result<()> {
        fs::create_dir_all(store_dir)?;
        let path = Self::path(store_dir);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RagError::Database(format!("Failed to serialize manifest: {}", e)))?;
        fs::write(&path, content)?;

        info!(
            "Store manifest written: model={}, dimension={}",
            self.embedding_model, self.embedding_dimension
        );
        Ok(())
    }

    /// Fail when the store was built with a different embedding model
    #[inline]
    pub fn ensure_model(&self, configured: &str) -> Result<()> {
        if self.embedding_model == configured {
            Ok(())
        } else {
            Err(RagError::EmbeddingModelMismatch {
                stored: self.embedding_model.clone(),
                configured: configured.to_string(),
            })
        }
    }
}
