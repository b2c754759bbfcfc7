// Embeddings module
// Token-window chunking and the embedding model abstraction

pub mod chunking;

pub use chunking::{
    Chunk, ChunkingConfig, HfTokenizer, TextSplitter, TokenSpans, WhitespaceTokenizer,
};

use anyhow::Result;

/// Turns text into fixed-dimension vectors.
///
/// Implementations return L2-normalized vectors so that cosine similarity and
/// dot product agree. The same model must be used at ingestion and query time.
pub trait Embedder: Send + Sync {
    /// Identifier persisted in the store manifest
    fn model_name(&self) -> &str;

    /// Embed a batch of chunk texts, preserving order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single question
    #[inline]
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_documents(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embedding model returned no vector for the query"))
    }
}

/// Scale `vector` to unit length in place. Zero vectors are left untouched.
#[inline]
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_produces_unit_vector() {
        let mut vector = vec![3.0, 4.0];
        normalize(&mut vector);
        assert!((vector[0] - 0.6).abs() < 1e-6);
        assert!((vector[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut vector = vec![0.0, 0.0, 0.0];
        normalize(&mut vector);
        assert_eq!(vector, vec![0.0, 0.0, 0.0]);
    }

    struct Fixed;

    impl Embedder for Fixed {
        fn model_name(&self) -> &str {
            "fixed"
        }

        fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[test]
    fn embed_query_uses_document_path() {
        let vector = Fixed.embed_query("abc").expect("should embed query");
        assert_eq!(vector, vec![3.0, 1.0]);
    }
}
