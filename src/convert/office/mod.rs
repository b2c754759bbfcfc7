
use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use super::{Document, DocumentLoader, DocumentMetadata, source_of};

const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type Package = ZipArchive<File>;

/// Element names carrying text in WordprocessingML and DrawingML parts
struct TextMarkup {
    text: &'static [u8],
    paragraph: &'static [u8],
    tab: &'static [u8],
    line_break: &'static [u8],
}

const WORD_MARKUP: TextMarkup = TextMarkup {
    text: b"w:t",
    paragraph: b"w:p",
    tab: b"w:tab",
    line_break: b"w:br",
};

const DRAWING_MARKUP: TextMarkup = TextMarkup {
    text: b"a:t",
    paragraph: b"a:p",
    tab: b"a:tab",
    line_break: b"a:br",
};

/// Word documents, converted as a single document
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxLoader;

impl DocumentLoader for DocxLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let mut package = open_package(path)?;
        let xml = read_part(&mut package, "word/document.xml")?;
        let content = extract_paragraphs(&xml, &WORD_MARKUP)?;

        Ok(vec![Document {
            content,
            metadata: DocumentMetadata::new(source_of(path), DOCX_CONTENT_TYPE),
        }])
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["docx"]
    }
}

/// PowerPoint decks, one document per slide
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxLoader;

impl DocumentLoader for PptxLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let mut package = open_package(path)?;

        let mut slides: Vec<(u32, String)> = package
            .file_names()
            .filter_map(|name| {
                let number = name
                    .strip_prefix("ppt/slides/slide")?
                    .strip_suffix(".xml")?
                    .parse()
                    .ok()?;
                Some((number, name.to_string()))
            })
            .collect();
        slides.sort_unstable_by_key(|(number, _)| *number);

        debug!("Found {} slides in {}", slides.len(), path.display());

        let source = source_of(path);
        let mut documents = Vec::with_capacity(slides.len());
        for (number, part) in slides {
            let xml = read_part(&mut package, &part)?;
            documents.push(Document {
                content: extract_paragraphs(&xml, &DRAWING_MARKUP)?,
                metadata: DocumentMetadata::new(source.clone(), PPTX_CONTENT_TYPE)
                    .with_page(Some(number)),
            });
        }

        Ok(documents)
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["pptx"]
    }
}

/// Excel workbooks, one document per worksheet with tab-separated rows
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxLoader;

impl DocumentLoader for XlsxLoader {
    #[inline]
    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let mut package = open_package(path)?;

        let shared_strings = if has_part(&package, "xl/sharedStrings.xml") {
            parse_shared_strings(&read_part(&mut package, "xl/sharedStrings.xml")?)?
        } else {
            Vec::new()
        };

        let sheets = parse_workbook(&read_part(&mut package, "xl/workbook.xml")?)?;
        let relationships = if has_part(&package, "xl/_rels/workbook.xml.rels") {
            parse_relationships(&read_part(&mut package, "xl/_rels/workbook.xml.rels")?)?
        } else {
            HashMap::new()
        };

        let source = source_of(path);
        let mut documents = Vec::with_capacity(sheets.len());
        for (position, sheet) in (1u32..).zip(sheets) {
            let part = sheet
                .relationship
                .as_ref()
                .and_then(|id| relationships.get(id))
                .map_or_else(
                    || format!("xl/worksheets/sheet{}.xml", position),
                    |target| resolve_target(target),
                );

            let content = parse_worksheet(&read_part(&mut package, &part)?, &shared_strings)?;
            documents.push(Document {
                content,
                metadata: DocumentMetadata::new(source.clone(), XLSX_CONTENT_TYPE)
                    .with_page(Some(position))
                    .with_extra("sheet", sheet.name),
            });
        }

        Ok(documents)
    }

    #[inline]
    fn supported_extensions(&self) -> &[&str] {
        &["xlsx"]
    }
}

fn open_package(path: &Path) -> Result<Package> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    ZipArchive::new(file)
        .with_context(|| format!("{} is not an Office Open XML package", path.display()))
}

fn has_part(package: &Package, name: &str) -> bool {
    package.file_names().any(|part| part == name)
}

fn read_part(package: &mut Package, name: &str) -> Result<String> {
    let mut part = package
        .by_name(name)
        .with_context(|| format!("Package has no part {}", name))?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)
        .with_context(|| format!("Failed to read part {}", name))?;
    Ok(xml)
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>> {
    match element.try_get_attribute(name)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Concatenate text runs, ending each paragraph with a newline
fn extract_paragraphs(xml: &str, markup: &TextMarkup) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == markup.text => in_text = true,
            Event::End(e) if e.name().as_ref() == markup.text => in_text = false,
            Event::End(e) if e.name().as_ref() == markup.paragraph => out.push('\n'),
            Event::Empty(e) if e.name().as_ref() == markup.tab => out.push('\t'),
            Event::Empty(e) if e.name().as_ref() == markup.line_break => out.push('\n'),
            Event::Text(t) if in_text => out.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" if !in_phonetic => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

struct SheetEntry {
    name: String,
    relationship: Option<String>,
}

fn parse_workbook(xml: &str) -> Result<Vec<SheetEntry>> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"sheet" => {
                let position = sheets.len() + 1;
                sheets.push(SheetEntry {
                    name: attribute(&e, b"name")?
                        .unwrap_or_else(|| format!("Sheet{}", position)),
                    relationship: attribute(&e, b"r:id")?,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(sheets)
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attribute(&e, b"Id")?, attribute(&e, b"Target")?)
                {
                    relationships.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(relationships)
}

/// Workbook relationship targets are relative to `xl/` unless absolute
fn resolve_target(target: &str) -> String {
    target
        .strip_prefix('/')
        .map_or_else(|| format!("xl/{}", target), ToString::to_string)
}

fn parse_worksheet(xml: &str, shared_strings: &[String]) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell_type: Option<String> = None;
    let mut value = String::new();
    let mut in_value = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"c" => {
                    cell_type = attribute(&e, b"t")?;
                    value.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let resolved = match cell_type.as_deref() {
                        Some("s") => value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|index| shared_strings.get(index))
                            .cloned()
                            .unwrap_or_default(),
                        Some("b") => {
                            if value.trim() == "1" {
                                "TRUE".to_string()
                            } else {
                                "FALSE".to_string()
                            }
                        }
                        _ => value.clone(),
                    };
                    if !resolved.trim().is_empty() {
                        cells.push(resolved);
                    }
                }
                b"row" => {
                    if !cells.is_empty() {
                        rows.push(cells.join("\t"));
                        cells.clear();
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_value => value.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows.join("\n"))
}
