use thiserror::Error;

use crate::RagError;

/// Which side a failed query round should be blamed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The question itself was unusable
    Input,
    /// Embedding model, vector store or language model failed
    ExternalService,
    /// The local setup is inconsistent and must be fixed before querying
    Configuration,
}

/// Failure of a single question/answer round
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("A pergunta está vazia")]
    EmptyQuestion,

    #[error("Falha na busca de trechos: {0}")]
    Retrieval(String),

    #[error("Falha ao gerar a resposta: {0}")]
    Generation(String),

    #[error("Configuração inválida: {0}")]
    Configuration(String),
}

impl QueryError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyQuestion => ErrorKind::Input,
            Self::Retrieval(_) | Self::Generation(_) => ErrorKind::ExternalService,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

impl From<RagError> for QueryError {
    #[inline]
    fn from(error: RagError) -> Self {
        match error {
            RagError::Config(_) | RagError::EmbeddingModelMismatch { .. } => {
                Self::Configuration(error.to_string())
            }
            RagError::Generation(message) => Self::Generation(message),
            other => Self::Retrieval(other.to_string()),
        }
    }
}
