//! Document text extraction.
//!
//! Converts an accepted upload into plain text. Text formats are decoded
//! directly; binary formats go through their parsers. Any parse failure is
//! reported in the [`ExtractionResult`] instead of aborting the upload.

use std::io::{Cursor, Read};

use calamine::Reader as _;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::domain::{AppError, ExtractionResult, Result, UploadedFile};

use super::analysis::analyze;
use super::validator::DocumentKind;

/// Compound File Binary signature used by legacy Office documents.
const OLE_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Size of the compound file header sector.
const OLE_HEADER_LEN: usize = 512;

/// Shortest text run kept when scanning legacy binaries.
const MIN_RUN: usize = 6;

/// Turns an accepted upload into text plus analysis.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, file: &UploadedFile, kind: DocumentKind) -> ExtractionResult;
}

/// Extractor backed by the built-in parsers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardExtractor;

impl DocumentExtractor for StandardExtractor {
    fn extract(&self, file: &UploadedFile, kind: DocumentKind) -> ExtractionResult {
        extract_document(file, kind)
    }
}

/// Extracts text and analysis from an upload of a known kind.
///
/// Identical bytes always produce an identical result.
pub fn extract_document(file: &UploadedFile, kind: DocumentKind) -> ExtractionResult {
    match extract_text(&file.content, kind) {
        Ok(text) => {
            let analysis = analyze(&text, kind);
            tracing::info!(
                file = %file.original_name,
                kind = kind.extension(),
                chars = text.len(),
                "Extracted document text"
            );
            ExtractionResult::extracted(text, Some(analysis))
        }
        Err(e) => {
            tracing::warn!(file = %file.original_name, error = %e, "Extraction failed");
            ExtractionResult::failed(e.to_string())
        }
    }
}

/// Recovers plain text from raw bytes.
///
/// An empty payload yields empty text for every kind.
///
/// # Errors
/// Returns an extraction error if a binary format cannot be parsed.
pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String> {
    if bytes.is_empty() {
        return Ok(String::new());
    }

    match kind {
        DocumentKind::Txt | DocumentKind::Csv | DocumentKind::Json => Ok(decode_text(bytes)),
        DocumentKind::Pdf => extract_pdf(bytes),
        DocumentKind::Docx => extract_docx(bytes),
        DocumentKind::Xls | DocumentKind::Xlsx => extract_spreadsheet(bytes),
        DocumentKind::Doc => extract_legacy_doc(bytes),
    }
}

fn failure(message: impl Into<String>) -> AppError {
    AppError::Extraction {
        message: message.into(),
    }
}

/// Decodes text content, honouring UTF-8 and UTF-16LE byte order marks.
fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    String::from_utf8_lossy(bytes).into_owned()
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let owned = bytes.to_vec();
    // pdf-extract panics on some malformed inputs.
    let outcome = std::panic::catch_unwind(move || pdf_extract::extract_text_from_mem(&owned));

    match outcome {
        Ok(Ok(text)) => Ok(text.trim().to_string()),
        Ok(Err(e)) => Err(failure(format!("PDF parse error: {e}"))),
        Err(_) => Err(failure("PDF parser aborted on malformed input")),
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| failure(format!("Not a DOCX container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| failure(format!("DOCX has no document body: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| failure(format!("Failed to read DOCX body: {e}")))?;

    document_xml_to_text(&xml)
}

/// Collects `w:t` runs, turning paragraphs into lines.
pub(crate) fn document_xml_to_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" | b"w:cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| failure(format!("Malformed DOCX text: {e}")))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(failure(format!(
                    "Malformed DOCX XML at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(out.trim_end_matches('\n').to_string())
}

fn extract_spreadsheet(bytes: &[u8]) -> Result<String> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| failure(format!("Spreadsheet parse error: {e}")))?;

    let mut out = String::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| failure(format!("Failed to read sheet {name}: {e}")))?;

        out.push_str(&format!("## {name}\n"));
        for row in range.rows() {
            let line = row
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\t");
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out.push('\n');
    }

    Ok(out.trim_end().to_string())
}

/// Heuristic text recovery for legacy `.doc` files.
///
/// Word stores body text either as UTF-16LE or as 8-bit characters; the
/// UTF-16 scan runs first and the 8-bit scan is the fallback.
fn extract_legacy_doc(bytes: &[u8]) -> Result<String> {
    if !bytes.starts_with(&OLE_SIGNATURE) {
        return Err(failure(
            "Not a legacy Word document (missing compound file signature)",
        ));
    }

    let body = &bytes[OLE_HEADER_LEN.min(bytes.len())..];
    let mut runs = utf16_runs(body);
    if runs.is_empty() {
        runs = byte_runs(body);
    }

    if runs.is_empty() {
        return Err(failure("No readable text found in legacy Word document"));
    }

    Ok(runs.join("\n"))
}

fn is_readable(c: char) -> bool {
    c == ' ' || c == '\t' || c.is_ascii_graphic() || ('\u{00C0}'..='\u{024F}').contains(&c)
}

fn keep_run(runs: &mut Vec<String>, current: &mut String) {
    let run = std::mem::take(current);
    let trimmed = run.trim();
    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    if trimmed.chars().count() >= MIN_RUN && letters * 2 >= trimmed.chars().count() {
        runs.push(trimmed.to_string());
    }
}

fn utf16_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();

    for pair in bytes.chunks_exact(2) {
        let unit = u16::from_le_bytes([pair[0], pair[1]]);
        match char::from_u32(u32::from(unit)) {
            Some(c) if is_readable(c) => current.push(c),
            _ => keep_run(&mut runs, &mut current),
        }
    }
    keep_run(&mut runs, &mut current);

    runs
}

fn byte_runs(bytes: &[u8]) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current = String::new();

    for &b in bytes {
        let c = char::from(b);
        if c == ' ' || c.is_ascii_graphic() {
            current.push(c);
        } else {
            keep_run(&mut runs, &mut current);
        }
    }
    keep_run(&mut runs, &mut current);

    runs
}
