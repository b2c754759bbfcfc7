use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use super::{Document, DocumentLoader, DocumentMetadata, source_of};

/// Extracts the text layer of a PDF, one document per page
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let pages = pdf_extract::extract_text_by_pages(path)
            .with_context(|| format!("Failed to extract PDF text from {}", path.display()))?;

        debug!("Extracted {} pages from {}", pages.len(), path.display());

        let source = source_of(path);
        Ok(pages
            .into_iter()
            .zip(1u32..)
            .map(|(content, page)| Document {
                content,
                metadata: DocumentMetadata::new(source.clone(), "application/pdf")
                    .with_page(Some(page)),
            })
            .collect())
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
