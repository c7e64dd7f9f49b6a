//! DOCX export.
//!
//! Writes the minimal WordprocessingML package: content types, the package
//! relationship and `word/document.xml`. Entries carry a fixed timestamp.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::domain::{AppError, Conversation, ExportRequest, Message, RenderKind, Result};

use super::{clean_title, format_timestamp, inclusion_label, split_segments, Segment};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const DOCUMENT_OPEN: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#;

const DOCUMENT_CLOSE: &str = r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1134" w:right="1134" w:bottom="1134" w:left="1134" w:header="709" w:footer="709" w:gutter="0"/></w:sectPr></w:body></w:document>"#;

/// Paragraph styles used by the export.
#[derive(Debug, Clone, Copy)]
enum Style {
    Title,
    Heading,
    Body,
    Code,
}

/// Drops characters XML 1.0 does not allow in documents.
fn xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| match c {
            '\t' | '\n' | '\r' => true,
            '\u{FFFE}' | '\u{FFFF}' => false,
            c => c >= ' ',
        })
        .collect()
}

fn paragraph(xml: &mut String, style: Style, text: &str) {
    let (ppr, rpr) = match style {
        Style::Title => ("", r#"<w:rPr><w:b/><w:sz w:val="48"/></w:rPr>"#),
        Style::Heading => (
            r#"<w:pPr><w:spacing w:before="240"/></w:pPr>"#,
            r#"<w:rPr><w:b/></w:rPr>"#,
        ),
        Style::Body => ("", ""),
        Style::Code => (
            r#"<w:pPr><w:spacing w:after="0"/><w:shd w:val="clear" w:color="auto" w:fill="EDEDED"/></w:pPr>"#,
            r#"<w:rPr><w:rFonts w:ascii="Courier New" w:hAnsi="Courier New"/><w:sz w:val="18"/></w:rPr>"#,
        ),
    };

    xml.push_str("<w:p>");
    xml.push_str(ppr);
    xml.push_str("<w:r>");
    xml.push_str(rpr);
    xml.push_str(r#"<w:t xml:space="preserve">"#);
    xml.push_str(&escape(xml_chars(text).as_str()));
    xml.push_str("</w:t></w:r></w:p>");
}

fn page_break(xml: &mut String) {
    xml.push_str(r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#);
}

/// Builds the `word/document.xml` body.
fn document_xml(conversation: &Conversation, messages: &[&Message], request: &ExportRequest) -> String {
    let mut xml = String::from(DOCUMENT_OPEN);

    paragraph(&mut xml, Style::Title, &clean_title(&request.title));
    paragraph(&mut xml, Style::Body, &format!("Conversation: {}", conversation.id));
    paragraph(
        &mut xml,
        Style::Body,
        &format!("Created: {}", format_timestamp(conversation.created_at)),
    );
    paragraph(&mut xml, Style::Body, &format!("Messages: {}", messages.len()));
    paragraph(
        &mut xml,
        Style::Body,
        &format!("Includes: {}", inclusion_label(request)),
    );
    page_break(&mut xml);

    for message in messages {
        let mut header = format!("{}  [{}]", message.role, format_timestamp(message.timestamp));
        if let Some(persona) = message.persona() {
            header.push_str(&format!("  ({})", persona.as_str()));
        }
        paragraph(&mut xml, Style::Heading, &header);

        for segment in split_segments(&message.content) {
            let (style, text) = match &segment {
                Segment::Prose(text) => (Style::Body, text),
                Segment::Code { text, .. } => (Style::Code, text),
            };
            for line in text.split('\n') {
                paragraph(&mut xml, style, line);
            }
        }
    }

    xml.push_str(DOCUMENT_CLOSE);
    xml
}

fn failed(e: impl std::fmt::Display) -> AppError {
    AppError::render(RenderKind::RenderFailed, format!("DOCX rendering failed: {e}"))
}

/// Packages the conversation as a Word document.
///
/// # Errors
/// Returns `RenderFailed` if the archive cannot be written.
pub fn render_docx(
    conversation: &Conversation,
    messages: &[&Message],
    request: &ExportRequest,
) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let parts = [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", PACKAGE_RELS.to_string()),
        ("word/document.xml", document_xml(conversation, messages, request)),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in &parts {
        zip.start_file(*name, options).map_err(failed)?;
        zip.write_all(body.as_bytes()).map_err(failed)?;
    }
    let bytes = zip.finish().map_err(failed)?.into_inner();

    tracing::debug!(conversation = %conversation.id, bytes = bytes.len(), "Rendered DOCX");
    Ok(bytes)
}
