
use anyhow::{Context, Result};
use pulldown_cmark::{Event, Options, Parser, TagEnd};
use std::fs;
use std::path::Path;

use super::{Document, DocumentLoader, DocumentMetadata, source_of};

/// Plain text and Markdown files
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = String::from_utf8_lossy(&bytes);

        let is_markdown = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));

        let (content, content_type) = if is_markdown {
            (markdown_to_text(&raw), "text/markdown")
        } else {
            (raw.into_owned(), "text/plain")
        };

        Ok(vec![Document {
            content,
            metadata: DocumentMetadata::new(source_of(path), content_type),
        }])
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}

/// Flatten Markdown into its readable text, one line per block
#[inline]
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();

    for event in Parser::new_ext(markdown, Options::ENABLE_TABLES) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::TableCell) => out.push('\t'),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableHead
                | TagEnd::TableRow
                | TagEnd::BlockQuote(_),
            ) => out.push('\n'),
            _ => {}
        }
    }

    out
}
