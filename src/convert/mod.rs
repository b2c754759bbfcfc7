// Document conversion module
// Turns heterogeneous source files into plain-text documents with metadata

pub mod html;
pub mod image;
pub mod office;
pub mod pdf;
pub mod text;


use anyhow::Result;
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tracing::debug;

use crate::RagError;

pub use html::HtmlLoader;
pub use image::{ImageLoader, ImageTranscriber};
pub use office::{DocxLoader, PptxLoader, XlsxLoader};
pub use pdf::PdfLoader;
pub use text::TextLoader;

/// Provenance of a converted document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Absolute path of the source file
    pub source: String,
    /// 1-based page, slide or image number when the format has one
    pub page: Option<u32>,
    pub content_type: String,
    /// Format-specific attributes (sheet name, HTML title, ...)
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl DocumentMetadata {
    #[inline]
    pub fn new(source: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            page: None,
            content_type: content_type.into(),
            extra: BTreeMap::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: Option<u32>) -> Self {
        self.page = page;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Text extracted from one file, or one page/slide/sheet of it
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

/// Loads every document contained in a file of a supported format
pub trait DocumentLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Vec<Document>>;

    /// Lowercase extensions without the leading dot
    fn supported_extensions(&self) -> &[&str];
}

/// Dispatches files to the loader registered for their extension
pub struct DocumentConverter {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl Default for DocumentConverter {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentConverter {
    /// Converter for every text-bearing format. Images need a transcriber,
    /// see [`DocumentConverter::with_transcriber`].
    #[inline]
    pub fn new() -> Self {
        Self {
            loaders: vec![
                Box::new(PdfLoader),
                Box::new(DocxLoader),
                Box::new(PptxLoader),
                Box::new(XlsxLoader),
                Box::new(HtmlLoader),
                Box::new(TextLoader),
            ],
        }
    }

    #[inline]
    #[must_use]
    pub fn with_transcriber(mut self, transcriber: Arc<dyn ImageTranscriber>) -> Self {
        self.register(Box::new(ImageLoader::new(transcriber)));
        self
    }

    #[inline]
    pub fn register(&mut self, loader: Box<dyn DocumentLoader>) {
        self.loaders.push(loader);
    }

    #[inline]
    pub fn supports(&self, extension: &str) -> bool {
        self.loader_for(extension).is_some()
    }

    fn loader_for(&self, extension: &str) -> Option<&dyn DocumentLoader> {
        self.loaders
            .iter()
            .find(|loader| {
                loader
                    .supported_extensions()
                    .iter()
                    .any(|ext| ext.eq_ignore_ascii_case(extension))
            })
            .map(Box::as_ref)
    }

    /// Convert a file into normalized, non-empty documents
    #[inline]
    pub fn convert(&self, path: &Path) -> crate::Result<Vec<Document>> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        let loader = self.loader_for(extension).ok_or_else(|| {
            RagError::Conversion(format!("Unsupported file type: {}", path.display()))
        })?;

        let documents = loader
            .load(path)
            .map_err(|e| RagError::Conversion(format!("{}: {:#}", path.display(), e)))?;

        let total = documents.len();
        let documents: Vec<Document> = documents
            .into_iter()
            .filter_map(|mut document| {
                document.content = normalize_whitespace(&document.content);
                (!document.content.is_empty()).then_some(document)
            })
            .collect();

        debug!(
            "Converted {} into {} documents ({} empty dropped)",
            path.display(),
            documents.len(),
            total - documents.len()
        );

        Ok(documents)
    }
}

static HORIZONTAL_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[ \t\u{00A0}\u{200B}]+").expect("valid regex"));

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Collapse runs of spaces, trim every line and keep at most one blank line
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = unified
        .lines()
        .map(|line| HORIZONTAL_WHITESPACE.replace_all(line, " ").trim().to_string())
        .collect();
    EXCESS_NEWLINES
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Drop metadata values that are not strings, numbers or booleans.
///
/// Returns the number of removed entries.
#[inline]
pub fn filter_complex_metadata(metadata: &mut DocumentMetadata) -> usize {
    let before = metadata.extra.len();
    metadata
        .extra
        .retain(|_, value| matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_)));
    before - metadata.extra.len()
}

/// Display form of a path used as the `source` of its documents
pub(crate) fn source_of(path: &Path) -> String {
    path.display().to_string()
}
