// Query pipeline
// Question -> MMR retrieval -> grounded prompt -> language model answer

pub mod errors;
pub mod generator;
pub mod mmr;
pub mod prompt;
pub mod retriever;


use std::fmt;
use tracing::{debug, info};

pub use errors::{ErrorKind, QueryError};
pub use generator::{Generator, OllamaGenerator};
pub use prompt::build_prompt;
pub use retriever::{MmrRetriever, Retriever};

/// Answer given when the documents do not support a reply
pub const INSUFFICIENT_CONTEXT_ANSWER: &str = "Com base apenas nos documentos carregados, não encontrei informação suficiente para responder com segurança.";

/// A stored chunk selected to answer a question
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub content: String,
    pub source: String,
    pub page: Option<u32>,
    /// Cosine similarity to the question
    pub score: f32,
}

/// Citation of a chunk used for an answer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub source: String,
    pub page: Option<u32>,
    pub content: String,
}

impl fmt::Display for SourceRef {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{} (página {})", self.source, page),
            None => write!(f, "{} (página ?)", self.source),
        }
    }
}

impl From<RetrievedChunk> for SourceRef {
    #[inline]
    fn from(chunk: RetrievedChunk) -> Self {
        Self {
            source: chunk.source,
            page: chunk.page,
            content: chunk.content,
        }
    }
}

/// Answer plus the chunks it was grounded on, in retrieval order
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

/// Retrieval and generation composed into one question/answer round
pub struct RagPipeline {
    retriever: Box<dyn Retriever>,
    generator: Box<dyn Generator>,
}

impl RagPipeline {
    #[inline]
    pub fn new(retriever: Box<dyn Retriever>, generator: Box<dyn Generator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Answer `question` from the stored documents.
    ///
    /// When nothing relevant is stored the fixed insufficient-context answer is
    /// returned without calling the language model.
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<QueryResult, QueryError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::EmptyQuestion);
        }

        let chunks = self.retriever.retrieve(question).await?;
        if chunks.is_empty() {
            info!("No chunks retrieved, answering with the fallback phrase");
            return Ok(QueryResult {
                answer: INSUFFICIENT_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        debug!("Retrieved {} chunks", chunks.len());

        let prompt = build_prompt(&chunks, question);
        let completion = self.generator.generate(&prompt).await?;
        let answer = if completion.trim().is_empty() {
            INSUFFICIENT_CONTEXT_ANSWER.to_string()
        } else {
            completion.trim().to_string()
        };

        Ok(QueryResult {
            answer,
            sources: chunks.into_iter().map(SourceRef::from).collect(),
        })
    }
}
