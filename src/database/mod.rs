// Database module
// LanceDB vector store holding chunk embeddings and their metadata

pub mod lancedb;

pub use lancedb::{
    ChunkMetadata, EmbeddingRecord, StoreManifest,
    vector_store::{SearchResult, VectorStore},
};
