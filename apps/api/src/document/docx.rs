//! Minimal WordprocessingML (.docx) codec.
//!
//! Reads body paragraphs out of `word/document.xml`, writes fresh packages,
//! and splices new paragraphs into an existing package while copying every
//! other part byte-for-byte. Only paragraph-level text is modelled.

use std::io::{Cursor, Read, Write};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::AppError;

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

pub const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

pub const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

/// US Letter with 1" margins, in twentieths of a point.
const DOCUMENT_TAIL: &str = r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a valid .docx package: {0}")]
    Package(#[from] ZipError),

    #[error("the package has no {DOCUMENT_PART} part")]
    MissingDocumentPart,

    #[error("the document XML has no body")]
    MissingBody,

    #[error("malformed document XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("failed to read document part: {0}")]
    Read(std::io::Error),

    #[error("failed to write document package: {0}")]
    Write(#[from] std::io::Error),
}

impl From<DocxError> for AppError {
    fn from(e: DocxError) -> Self {
        match e {
            DocxError::Write(io) => AppError::Internal(anyhow::anyhow!("docx write failed: {io}")),
            other => AppError::DocumentFormat(other.to_string()),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Reading
// ────────────────────────────────────────────────────────────────────────────

/// Reads the main document part of a package as UTF-8 XML.
pub fn read_document_xml(bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    read_entry(&mut archive, DOCUMENT_PART)
}

fn read_entry<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> Result<String, DocxError> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => DocxError::MissingDocumentPart,
        other => DocxError::Package(other),
    })?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(DocxError::Read)?;
    Ok(xml)
}

/// Collects the text of every top-level body paragraph, in document order.
///
/// Whitespace-only paragraphs are dropped. Paragraphs nested in tables or
/// text boxes are skipped, as is anything that is not run text (`w:t`),
/// tabs (`w:tab`) or line breaks (`w:br`, `w:cr`).
pub fn read_paragraphs(xml: &str) -> Result<Vec<String>, DocxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut skip_depth = 0usize;
    let mut in_run = false;
    let mut in_text = false;
    let mut saw_body = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:body" => saw_body = true,
                b"w:tbl" | b"w:txbxContent" => skip_depth += 1,
                b"w:p" if skip_depth == 0 => current = Some(String::new()),
                b"w:r" => in_run = true,
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if skip_depth > 0 || !in_run {
                    continue;
                }
                if let Some(text) = current.as_mut() {
                    match e.name().as_ref() {
                        b"w:tab" => text.push('\t'),
                        b"w:br" | b"w:cr" => text.push('\n'),
                        _ => {}
                    }
                }
            }
            Event::Text(t) => {
                if in_text && skip_depth == 0 {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&t.unescape()?);
                    }
                }
            }
            Event::CData(t) => {
                if in_text && skip_depth == 0 {
                    if let Some(text) = current.as_mut() {
                        text.push_str(&String::from_utf8_lossy(&t));
                    }
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:tbl" | b"w:txbxContent" => skip_depth = skip_depth.saturating_sub(1),
                b"w:p" if skip_depth == 0 => {
                    if let Some(text) = current.take() {
                        if !text.trim().is_empty() {
                            paragraphs.push(text);
                        }
                    }
                }
                b"w:r" => in_run = false,
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_body {
        return Err(DocxError::MissingBody);
    }
    Ok(paragraphs)
}

/// Byte offset in `xml` where new body content belongs: just before the
/// body-level `w:sectPr`, or before `</w:body>` when there is none.
fn body_insertion_point(xml: &str) -> Result<usize, DocxError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match e.name().as_ref() {
                    b"w:body" => body_depth = Some(depth),
                    b"w:sectPr" if body_depth.map_or(false, |b| depth == b + 1) => {
                        return Ok(offset)
                    }
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"w:sectPr" && body_depth == Some(depth) {
                    return Ok(offset);
                }
            }
            Event::End(e) => {
                if e.name().as_ref() == b"w:body" {
                    return Ok(offset);
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => return Err(DocxError::MissingBody),
            _ => {}
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Writing
// ────────────────────────────────────────────────────────────────────────────

/// XML for one paragraph. `\n` becomes a line break and `\t` a tab, so text
/// read back through [`read_paragraphs`] is unchanged.
pub fn paragraph(text: &str) -> String {
    paragraph_with_run_props(text, "")
}

/// A bold 16pt paragraph, used for section headings without relying on the
/// document defining a `Heading1` style.
pub fn heading(text: &str) -> String {
    paragraph_with_run_props(text, "<w:rPr><w:b/><w:sz w:val=\"32\"/></w:rPr>")
}

fn paragraph_with_run_props(text: &str, run_props: &str) -> String {
    let text = xml_chars(text);
    if text.is_empty() {
        return "<w:p/>".to_string();
    }

    let mut runs = String::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            runs.push_str("<w:br/>");
        }
        for (j, segment) in line.split('\t').enumerate() {
            if j > 0 {
                runs.push_str("<w:tab/>");
            }
            if !segment.is_empty() {
                runs.push_str("<w:t xml:space=\"preserve\">");
                runs.push_str(&escape(segment));
                runs.push_str("</w:t>");
            }
        }
    }
    format!("<w:p><w:r>{run_props}{runs}</w:r></w:p>")
}

/// Drops characters outside the XML 1.0 `Char` production. Tab, line feed
/// and carriage return are the only control characters allowed.
fn xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            !(c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r'))
                && !matches!(c, '\u{FFFE}' | '\u{FFFF}')
        })
        .collect()
}

fn zip_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Writes a new single-part package whose body is `body_xml`.
pub fn write_package(body_xml: &str) -> Result<Vec<u8>, DocxError> {
    let document = format!("{DOCUMENT_HEAD}{body_xml}{DOCUMENT_TAIL}");

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", PACKAGE_RELS_XML),
        (DOCUMENT_PART, document.as_str()),
    ] {
        zip.start_file(name, zip_options())?;
        zip.write_all(content.as_bytes())?;
    }
    Ok(zip.finish()?.into_inner())
}

/// Returns a copy of `original` with `body_xml` appended to the end of the
/// document body. All other parts (styles, numbering, media, headers) are
/// copied without recompression.
pub fn append_to_body(original: &[u8], body_xml: &str) -> Result<Vec<u8>, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(original))?;
    let document = read_entry(&mut archive, DOCUMENT_PART)?;

    let at = body_insertion_point(&document)?;
    let mut rewritten = String::with_capacity(document.len() + body_xml.len());
    rewritten.push_str(&document[..at]);
    rewritten.push_str(body_xml);
    rewritten.push_str(&document[at..]);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.name() == DOCUMENT_PART {
            drop(entry);
            zip.start_file(DOCUMENT_PART, zip_options())?;
            zip.write_all(rewritten.as_bytes())?;
        } else {
            zip.raw_copy_file(entry)?;
        }
    }
    Ok(zip.finish()?.into_inner())
}
