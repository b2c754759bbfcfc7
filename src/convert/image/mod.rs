#[cfg(test)]
mod tests;

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::{Document, DocumentLoader, DocumentMetadata, source_of};

/// Reads the text out of a scanned page or picture
pub trait ImageTranscriber: Send + Sync {
    fn transcribe(&self, image: &[u8]) -> Result<String>;
}

/// Images converted through an [`ImageTranscriber`]
pub struct ImageLoader {
    transcriber: Arc<dyn ImageTranscriber>,
}

impl ImageLoader {
    #[inline]
    pub fn new(transcriber: Arc<dyn ImageTranscriber>) -> Self {
        Self { transcriber }
    }
}

impl DocumentLoader for ImageLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        if bytes.is_empty() {
            bail!("Image file is empty");
        }

        let content_type = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
            _ => "image/jpeg",
        };

        debug!("Transcribing {} ({} bytes)", path.display(), bytes.len());
        let content = self
            .transcriber
            .transcribe(&bytes)
            .with_context(|| format!("Failed to transcribe {}", path.display()))?;

        Ok(vec![Document {
            content,
            metadata: DocumentMetadata::new(source_of(path), content_type),
        }])
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["png", "jpg", "jpeg"]
    }
}
