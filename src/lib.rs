use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("{0}")]
    Input(String),

    #[error(
        "Embedding model mismatch: store was built with '{stored}' but '{configured}' is configured"
    )]
    EmbeddingModelMismatch { stored: String, configured: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod context;
pub mod convert;
pub mod database;
pub mod embeddings;
pub mod frontends;
pub mod ingest;
pub mod ollama;
pub mod query;
