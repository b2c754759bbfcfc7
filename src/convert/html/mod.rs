
use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Node, Selector};
use std::fs;
use std::path::Path;

use super::{Document, DocumentLoader, DocumentMetadata, source_of};

/// Elements whose content never reaches the reader
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "head", "nav", "header", "footer", "iframe",
    "svg", "button",
];

const BLOCK_ELEMENTS: &[&str] = &[
    "p",
    "div",
    "br",
    "li",
    "ul",
    "ol",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "tr",
    "table",
    "section",
    "article",
    "main",
    "aside",
    "blockquote",
    "pre",
    "dt",
    "dd",
    "hr",
];

/// HTML pages reduced to their visible text
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlLoader;

impl DocumentLoader for HtmlLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let html = String::from_utf8_lossy(&bytes);
        let (title, content) = extract_visible_text(&html);

        let mut metadata = DocumentMetadata::new(source_of(path), "text/html");
        if let Some(title) = title {
            metadata = metadata.with_extra("title", title);
        }

        Ok(vec![Document { content, metadata }])
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["html", "htm"]
    }
}

/// Page title and body text of an HTML document
#[inline]
pub fn extract_visible_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);
    let title_selector = Selector::parse("title").expect("valid selector");
    let body_selector = Selector::parse("body").expect("valid selector");

    let title = document
        .select(&title_selector)
        .next()
        .map(|title| title.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty());

    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut text = String::new();
    collect_text(root, &mut text);

    (title, text)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&text.text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                if let Some(child_element) = ElementRef::wrap(child) {
                    collect_text(child_element, out);
                }
                match name {
                    "td" | "th" => out.push('\t'),
                    _ if BLOCK_ELEMENTS.contains(&name) => out.push('\n'),
                    _ => {}
                }
            }
            _ => {}
        }
    }
}
