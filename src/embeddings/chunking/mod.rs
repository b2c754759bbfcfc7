
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::convert::{Document, DocumentMetadata};

/// Represents a chunk of document text ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// The chunk text, an exact slice of the document text
    pub content: String,
    /// Metadata inherited from the source document
    pub metadata: DocumentMetadata,
    /// The index of this chunk within its document
    pub chunk_index: usize,
    /// Number of tokens in the window
    pub token_count: usize,
}

/// Configuration for token-window chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in tokens
    pub chunk_size: usize,
    /// Tokens shared by adjacent windows of the same document
    pub chunk_overlap: usize,
    /// HuggingFace `tokenizer.json` matching the embedding model.
    /// Without it, whitespace-delimited words are counted as tokens.
    pub tokenizer_path: Option<PathBuf>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 350,
            chunk_overlap: 40,
            tokenizer_path: None,
        }
    }
}

/// Produces the byte span of every token in a text, in order
pub trait TokenSpans: Send + Sync {
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>>;
}

/// Treats every run of non-whitespace characters as one token
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl TokenSpans for WhitespaceTokenizer {
    #[inline]
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>> {
        let mut spans = Vec::new();
        let mut start = None;

        for (idx, ch) in text.char_indices() {
            if ch.is_whitespace() {
                if let Some(token_start) = start.take() {
                    spans.push((token_start, idx));
                }
            } else if start.is_none() {
                start = Some(idx);
            }
        }

        if let Some(token_start) = start {
            spans.push((token_start, text.len()));
        }

        Ok(spans)
    }
}

/// Tokenizer loaded from a HuggingFace `tokenizer.json`
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    #[inline]
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer {}: {}", path.display(), e))?;
        Self::from_tokenizer(inner)
    }

    /// Wraps a tokenizer, dropping any truncation or padding it was saved with
    /// so that spans always cover the whole text
    #[inline]
    pub fn from_tokenizer(mut inner: tokenizers::Tokenizer) -> Result<Self> {
        inner
            .with_truncation(None)
            .map_err(|e| anyhow!("Failed to disable tokenizer truncation: {}", e))?;
        inner.with_padding(None);
        Ok(Self { inner })
    }
}

impl TokenSpans for HfTokenizer {
    #[inline]
    fn token_spans(&self, text: &str) -> Result<Vec<(usize, usize)>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| anyhow!("Failed to tokenize text: {}", e))?;

        Ok(encoding
            .get_offsets()
            .iter()
            .copied()
            .filter(|(start, end)| end > start)
            .collect())
    }
}

/// Splits documents into overlapping windows of at most `chunk_size` tokens
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    tokenizer: Box<dyn TokenSpans>,
}

impl TextSplitter {
    #[inline]
    pub fn new(config: &ChunkingConfig, tokenizer: Box<dyn TokenSpans>) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(anyhow!("Chunk size must be greater than zero"));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(anyhow!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                config.chunk_overlap,
                config.chunk_size
            ));
        }

        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            tokenizer,
        })
    }

    /// Build a splitter using the configured tokenizer file, or whitespace tokens
    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        let tokenizer: Box<dyn TokenSpans> = match &config.tokenizer_path {
            Some(path) => Box::new(HfTokenizer::from_file(path)?),
            None => Box::new(WhitespaceTokenizer),
        };
        Self::new(config, tokenizer)
    }

    #[inline]
    pub fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.tokenizer.token_spans(text)?.len())
    }

    /// Split raw text into `(window text, token count)` pairs.
    ///
    /// Windows start every `chunk_size - chunk_overlap` tokens and the last
    /// one ends at the final token, so adjacent windows share exactly
    /// `chunk_overlap` tokens.
    #[inline]
    pub fn split_text(&self, text: &str) -> Result<Vec<(String, usize)>> {
        let spans = self.tokenizer.token_spans(text)?;
        if spans.is_empty() {
            return Ok(Vec::new());
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let end = (start + self.chunk_size).min(spans.len());
            let byte_start = spans[start].0;
            let byte_end = spans[end - 1].1;
            windows.push((slice_on_char_boundaries(text, byte_start, byte_end), end - start));

            if end == spans.len() {
                break;
            }
            start += step;
        }

        Ok(windows)
    }

    /// Split a single document, carrying its metadata onto every chunk
    #[inline]
    pub fn split_document(&self, document: &Document) -> Result<Vec<Chunk>> {
        let windows = self
            .split_text(&document.content)
            .with_context(|| format!("Failed to chunk {}", document.metadata.source))?;

        Ok(windows
            .into_iter()
            .enumerate()
            .map(|(chunk_index, (content, token_count))| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index,
                token_count,
            })
            .collect())
    }

    #[inline]
    pub fn split_documents(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for document in documents {
            chunks.extend(self.split_document(document)?);
        }

        debug!(
            "Split {} documents into {} chunks (avg {} tokens)",
            documents.len(),
            chunks.len(),
            chunks.iter().map(|c| c.token_count).sum::<usize>() / chunks.len().max(1)
        );

        Ok(chunks)
    }
}

/// Slice `text[start..end]`, widening the range to the nearest char boundaries
fn slice_on_char_boundaries(text: &str, start: usize, end: usize) -> String {
    let mut start = start.min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = end.min(text.len()).max(start);
    while !text.is_char_boundary(end) {
        end += 1;
    }
    text.get(start..end).unwrap_or_default().to_string()
}
