//! PDF export.
//!
//! Pages are built directly with lopdf using the standard Type1 fonts, so no
//! font files are embedded. Text is written in WinAnsi; characters the
//! encoding has no code for are replaced with `?`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::domain::{AppError, Conversation, ExportRequest, Message, RenderKind, Result};

use super::{clean_title, format_timestamp, inclusion_label, split_segments, Segment};

const PAGE_WIDTH: i64 = 612;
const PAGE_HEIGHT: i64 = 792;
const MARGIN: i64 = 56;

const PROSE_WRAP: usize = 88;
const CODE_WRAP: usize = 90;
const CODE_INDENT: i64 = 12;

#[derive(Debug, Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    const fn resource(self) -> &'static str {
        match self {
            Self::Regular => "F1",
            Self::Bold => "F2",
            Self::Mono => "F3",
        }
    }
}

/// Accumulates drawing operations page by page, top to bottom.
struct PageWriter {
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    y: i64,
}

impl PageWriter {
    const fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Vec::new(),
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn advance(&mut self, leading: i64) {
        if self.y - leading < MARGIN {
            self.page_break();
        }
        self.y -= leading;
    }

    fn text(&mut self, font: Font, size: i64, indent: i64, leading: i64, text: &str) {
        self.advance(leading);
        self.current.extend(text_ops(font, size, MARGIN + indent, self.y, text));
    }

    fn shaded_text(&mut self, font: Font, size: i64, indent: i64, leading: i64, text: &str) {
        self.advance(leading);
        let x = MARGIN + indent;
        self.current.extend([
            Operation::new("q", vec![]),
            Operation::new("g", vec![Object::Real(0.93)]),
            Operation::new(
                "re",
                vec![
                    Object::Integer(x - 4),
                    Object::Integer(self.y - 3),
                    Object::Integer(PAGE_WIDTH - 2 * MARGIN - indent + 8),
                    Object::Integer(leading),
                ],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.current.extend(text_ops(font, size, x, self.y, text));
    }

    fn gap(&mut self, height: i64) {
        self.y -= height;
    }

    fn page_break(&mut self) {
        self.pages.push(std::mem::take(&mut self.current));
        self.y = PAGE_HEIGHT - MARGIN;
    }

    fn finish(mut self) -> Vec<Vec<Operation>> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.pages.push(self.current);
        }
        self.pages
    }
}

fn text_ops(font: Font, size: i64, x: i64, y: i64, text: &str) -> [Operation; 5] {
    [
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![font.resource().into(), Object::Integer(size)],
        ),
        Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
        Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// Code points WinAnsi places in 0x80..=0x9F, indexed from 0x80.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

/// WinAnsi byte for one character, if the encoding has one.
fn win_ansi_byte(c: char) -> Option<u8> {
    match u32::from(c) {
        0x20..=0x7E | 0xA0..=0xFF => u8::try_from(u32::from(c)).ok(),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|&mapped| mapped == Some(c))
            .and_then(|i| u8::try_from(0x80 + i).ok()),
    }
}

/// WinAnsi bytes for the standard fonts.
pub(super) fn win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\t' => out.extend_from_slice(b"    "),
            c => out.push(win_ansi_byte(c).unwrap_or(b'?')),
        }
    }
    out
}

/// Greedy word wrap; words longer than the width are split.
fn wrap_words(line: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current.is_empty() { word.len() } else { current.chars().count() + 1 + word.len() };
        if needed > width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Hard wrap that keeps leading whitespace, for code.
fn wrap_chars(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}

fn font(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn failed(e: impl std::fmt::Display) -> AppError {
    AppError::render(RenderKind::RenderFailed, format!("PDF rendering failed: {e}"))
}

/// Renders a title page followed by the message blocks.
///
/// # Errors
/// Returns `RenderFailed` if the document cannot be encoded.
pub fn render_pdf(
    conversation: &Conversation,
    messages: &[&Message],
    request: &ExportRequest,
) -> Result<Vec<u8>> {
    let mut writer = PageWriter::new();

    writer.text(Font::Bold, 24, 0, 32, &clean_title(&request.title));
    writer.gap(12);
    for line in [
        format!("Conversation: {}", conversation.id),
        format!("Created: {}", format_timestamp(conversation.created_at)),
        format!("Messages: {}", messages.len()),
        format!("Includes: {}", inclusion_label(request)),
    ] {
        writer.text(Font::Regular, 11, 0, 16, &line);
    }
    writer.page_break();

    for message in messages {
        let mut header = format!("{}  [{}]", message.role, format_timestamp(message.timestamp));
        if let Some(persona) = message.persona() {
            header.push_str(&format!("  ({})", persona.as_str()));
        }
        writer.text(Font::Bold, 11, 0, 18, &header);

        for segment in split_segments(&message.content) {
            match segment {
                Segment::Prose(text) => {
                    for line in text.split('\n') {
                        for wrapped in wrap_words(line, PROSE_WRAP) {
                            writer.text(Font::Regular, 10, 0, 14, &wrapped);
                        }
                    }
                }
                Segment::Code { text, .. } => {
                    writer.gap(4);
                    for line in text.split('\n') {
                        for wrapped in wrap_chars(line, CODE_WRAP) {
                            writer.shaded_text(Font::Mono, 9, CODE_INDENT, 12, &wrapped);
                        }
                    }
                    writer.gap(4);
                }
            }
        }
        writer.gap(10);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let fonts = dictionary! {
        Font::Regular.resource() => doc.add_object(font("Helvetica")),
        Font::Bold.resource() => doc.add_object(font("Helvetica-Bold")),
        Font::Mono.resource() => doc.add_object(font("Courier")),
    };
    let resources_id = doc.add_object(dictionary! { "Font" => fonts });

    let mut kids: Vec<Object> = Vec::new();
    for operations in writer.finish() {
        let content = Content { operations }.encode().map_err(failed)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).map_err(failed)?;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(failed)?;

    tracing::debug!(
        conversation = %conversation.id,
        pages = count,
        bytes = out.len(),
        "Rendered PDF"
    );
    Ok(out)
}
