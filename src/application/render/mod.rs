//! Export rendering.
//!
//! Every format renders the same filtered message list; only presentation
//! differs. Output never embeds the wall clock, so re-exporting an
//! unchanged conversation yields identical bytes.

mod docx;
mod json;
mod pdf;
mod text;

pub use json::{import_json, render_json, JsonExport};
pub use text::{parse_transcript, render_transcript, TranscriptEntry};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{
    AppError, Conversation, ExportArtifact, ExportFormat, ExportRequest, Message, RenderKind,
    Result,
};

/// Renders a conversation into the requested format.
///
/// # Errors
/// Returns `EmptyConversation` when there are no messages, or `RenderFailed`
/// when a document backend fails.
pub fn render_export(
    conversation: &Conversation,
    request: &ExportRequest,
    filename_prefix: &str,
) -> Result<ExportArtifact> {
    if conversation.messages.is_empty() {
        return Err(AppError::render(
            RenderKind::EmptyConversation,
            format!("Conversation {} has no messages to export", conversation.id),
        ));
    }

    let messages = select_messages(conversation, request);
    tracing::debug!(
        conversation = %conversation.id,
        format = %request.format,
        selected = messages.len(),
        total = conversation.messages.len(),
        "Rendering export"
    );

    let bytes = match request.format {
        ExportFormat::Txt => render_transcript(conversation, &messages, &request.title).into_bytes(),
        ExportFormat::Json => render_json(conversation, &messages, request)?,
        ExportFormat::Pdf => pdf::render_pdf(conversation, &messages, request)?,
        ExportFormat::Docx => docx::render_docx(conversation, &messages, request)?,
    };

    Ok(ExportArtifact {
        bytes,
        content_type: request.format.content_type(),
        filename: export_filename(filename_prefix, &conversation.id, request.format),
    })
}

/// Applies the analysis/code inclusion filters. Unmarked messages always pass.
pub fn select_messages<'a>(
    conversation: &'a Conversation,
    request: &ExportRequest,
) -> Vec<&'a Message> {
    conversation
        .messages
        .iter()
        .filter(|m| request.include_analysis || !m.is_analysis())
        .filter(|m| request.include_code || !m.is_code())
        .collect()
}

/// Deterministic download name: `<prefix>-<id>.<ext>`.
#[must_use]
pub fn export_filename(prefix: &str, conversation_id: &str, format: ExportFormat) -> String {
    let safe_id: String = conversation_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}-{safe_id}.{}", format.extension())
}

/// Timestamp form shared by all renderers.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Single-line title; newlines would break the transcript header.
pub(crate) fn clean_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prose or fenced code within a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Prose(String),
    Code {
        language: Option<String>,
        text: String,
    },
}

/// Splits message content on triple-backtick fences. An unclosed fence runs
/// to the end of the message.
pub(crate) fn split_segments(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut fence: Option<Option<String>> = None;

    for line in content.split('\n') {
        let trimmed = line.trim_start();
        if let Some(info) = trimmed.strip_prefix("```") {
            match fence.take() {
                Some(language) => {
                    segments.push(Segment::Code {
                        language,
                        text: buffer.join("\n"),
                    });
                }
                None => {
                    push_prose(&mut segments, &buffer);
                    let info = info.trim();
                    fence = Some((!info.is_empty()).then(|| info.to_string()));
                }
            }
            buffer.clear();
        } else {
            buffer.push(line);
        }
    }

    match fence {
        Some(language) => segments.push(Segment::Code {
            language,
            text: buffer.join("\n"),
        }),
        None => push_prose(&mut segments, &buffer),
    }

    segments
}

fn push_prose(segments: &mut Vec<Segment>, lines: &[&str]) {
    let text = lines.join("\n");
    if !text.trim().is_empty() {
        segments.push(Segment::Prose(text.trim_matches('\n').to_string()));
    }
}

/// Label for the kinds of content included in an export.
pub(crate) fn inclusion_label(request: &ExportRequest) -> String {
    let mut parts = vec!["dialogue"];
    if request.include_analysis {
        parts.push("analysis");
    }
    if request.include_code {
        parts.push("code");
    }
    parts.join(", ")
}


#[cfg(test)]
mod tests {
    use std::io::{Cursor, Read};

    use lopdf::content::Content;
    use lopdf::Object;

    use super::fixtures::*;
    use super::*;
    use crate::application::extractor::document_xml_to_text;
    use crate::domain::{MessageMetadata, Role};

    /// Concatenated `Tj` operands of every page, space separated.
    fn pdf_text(bytes: &[u8]) -> Vec<u8> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        let mut out = Vec::new();
        for page_id in doc.get_pages().into_values() {
            let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
            for op in content.operations.iter().filter(|op| op.operator == "Tj") {
                if let Some(Object::String(text, _)) = op.operands.first() {
                    out.extend_from_slice(text);
                    out.push(b' ');
                }
            }
        }
        out
    }

    fn docx_text(bytes: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        document_xml_to_text(&xml).unwrap()
    }

    /// Words of a message body, fence markers excluded.
    fn words(content: &str) -> Vec<&str> {
        content
            .split_whitespace()
            .filter(|w| !w.starts_with("```"))
            .collect()
    }

    #[test]
    fn test_code_filter_keeps_dialogue() {
        let conv = consultation();
        let mut req = request(ExportFormat::Txt);
        req.include_code = false;

        let selected = select_messages(&conv, &req);
        assert_eq!(selected.len(), 3);
        assert!(selected.iter().all(|m| !m.is_code()));
    }

    #[test]
    fn test_analysis_filter() {
        let mut conv = consultation();
        conv.messages.push(
            Message::new(Role::Assistant, "Recommendations").with_metadata(MessageMetadata {
                analysis_type: Some("erp".into()),
                ..Default::default()
            }),
        );
        let mut req = request(ExportFormat::Txt);
        req.include_analysis = false;
        assert_eq!(select_messages(&conv, &req).len(), 4);
        req.include_analysis = true;
        assert_eq!(select_messages(&conv, &req).len(), 5);
    }

    #[test]
    fn test_empty_conversation_is_rejected() {
        let conv = Conversation::new("empty");
        for format in ExportFormat::ALL {
            let err = render_export(&conv, &request(format), "eva-consultation").unwrap_err();
            assert_eq!(err.kind(), "empty_conversation");
        }
    }

    #[test]
    fn test_filename_and_content_type() {
        let conv = consultation();
        let artifact =
            render_export(&conv, &request(ExportFormat::Docx), "eva-consultation").unwrap();
        assert_eq!(artifact.filename, "eva-consultation-conv-1.docx");
        assert_eq!(
            artifact.content_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(
            export_filename("x", "a/b c", ExportFormat::Pdf),
            "x-a_b_c.pdf"
        );
    }

    #[test]
    fn test_re_export_is_identical() {
        let conv = consultation();
        for format in ExportFormat::ALL {
            let first = render_export(&conv, &request(format), "p").unwrap();
            let second = render_export(&conv, &request(format), "p").unwrap();
            assert_eq!(first.bytes, second.bytes, "{format} export is not stable");
        }
    }

    #[test]
    fn test_split_segments() {
        let segments = split_segments("Intro\n```abap\nWRITE 'x'.\n```\nOutro");
        assert_eq!(
            segments,
            vec![
                Segment::Prose("Intro".into()),
                Segment::Code {
                    language: Some("abap".into()),
                    text: "WRITE 'x'.".into()
                },
                Segment::Prose("Outro".into()),
            ]
        );

        let unclosed = split_segments("```\nSELECT 1");
        assert_eq!(
            unclosed,
            vec![Segment::Code {
                language: None,
                text: "SELECT 1".into()
            }]
        );
    }

    #[test]
    fn test_every_format_carries_the_same_messages() {
        let mut conv = consultation();
        conv.messages.push(
            Message::new(
                Role::Assistant,
                "Don\u{2019}t skip \u{201C}dunning\u{201D} \u{2014} budget \u{20AC}40k\u{2026}",
            )
            .at(at(5)),
        );

        for include_code in [true, false] {
            let mut req = request(ExportFormat::Txt);
            req.include_code = include_code;
            let selected = select_messages(&conv, &req);

            let render = |format: ExportFormat| {
                let mut req = req.clone();
                req.format = format;
                render_export(&conv, &req, "p").unwrap().bytes
            };

            let txt = String::from_utf8(render(ExportFormat::Txt)).unwrap();
            let json: JsonExport = serde_json::from_slice(&render(ExportFormat::Json)).unwrap();
            let docx = docx_text(&render(ExportFormat::Docx));
            let pdf = pdf_text(&render(ExportFormat::Pdf));

            let json_contents: Vec<&str> =
                json.messages.iter().map(|m| m.content.as_str()).collect();
            let selected_contents: Vec<&str> =
                selected.iter().map(|m| m.content.as_str()).collect();
            assert_eq!(json_contents, selected_contents);

            for message in &selected {
                for line in message.content.lines() {
                    assert!(txt.contains(line), "txt lacks {line:?}");
                }
                for word in words(&message.content) {
                    assert!(docx.contains(word), "docx lacks {word:?}");
                    let encoded = pdf::win_ansi(word);
                    assert!(
                        pdf.windows(encoded.len()).any(|w| w == encoded.as_slice()),
                        "pdf lacks {word:?}"
                    );
                }
            }

            let code_present = txt.contains("REPORT z_o2c.");
            assert_eq!(code_present, include_code);
            assert_eq!(docx.contains("REPORT z_o2c."), include_code);
        }
    }
}
