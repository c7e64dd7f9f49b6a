//! Terminal output for the CLI.
//!
//! Listings render as tables or JSON; metadata and upload results render as
//! colored summaries.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{ConversationSummary, ExportMetadata, UploadState};

use super::pipeline::UploadOutcome;
use super::validator::DocumentKind;

/// Output format options for listings.
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Compact table listing.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Formats conversation summaries as JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_summaries_json(
    summaries: &[ConversationSummary],
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summaries)
}

/// Formats a table listing of conversations.
pub fn format_summaries_table(summaries: &[ConversationSummary]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Created", "Msgs", "Preview"]);

    for summary in summaries {
        table.add_row(vec![
            summary.id.clone(),
            summary.created_at.format("%Y-%m-%d %H:%M").to_string(),
            summary.message_count.to_string(),
            truncate(&summary.preview, 48),
        ]);
    }

    table.to_string()
}

/// Formats an export preview.
pub fn format_metadata(conversation_id: &str, meta: &ExportMetadata) -> String {
    let personas = if meta.personas_used.is_empty() {
        "-".to_string()
    } else {
        meta.personas_used
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut out = format!(
        "{} {}\n  Messages: {}\n  Analysis: {}\n  Code: {}\n  Personas: {}\n  Span: {} .. {}\n",
        "📊 Export preview for".bold(),
        conversation_id.cyan(),
        meta.message_count.to_string().cyan(),
        yes_no(meta.has_analysis),
        yes_no(meta.has_code),
        personas,
        meta.duration.start.format("%Y-%m-%d %H:%M:%S"),
        meta.duration.end.format("%Y-%m-%d %H:%M:%S"),
    );

    out.push_str(&format!("  {}\n", "Estimated sizes:".bold()));
    for (format, bytes) in &meta.estimated_size_bytes {
        out.push_str(&format!("    {format:<5} ~{}\n", human_bytes(*bytes)));
    }

    out
}

/// Formats the result of a stored upload.
pub fn format_upload(outcome: &UploadOutcome) -> String {
    let status = match outcome.state {
        UploadState::Stored => "stored".green(),
        _ => "stored without analysis".yellow(),
    };

    let mut out = format!(
        "{} {} ({})\n  Conversation: {}\n  Message: {}\n",
        "📄".bold(),
        outcome.filename.bold(),
        status,
        outcome.conversation_id.cyan(),
        outcome.message.id,
    );

    if let Some(reason) = &outcome.extraction.error_reason {
        out.push_str(&format!("  Extraction error: {}\n", reason.red()));
    }

    if let Some(analysis) = &outcome.extraction.analysis {
        out.push_str(&format!(
            "  Words: {}  Lines: {}  Sections: {}  Tabular: {}  Complexity: {:?}\n",
            analysis.word_count,
            analysis.line_count,
            analysis.section_count,
            yes_no(analysis.has_tabular_data),
            analysis.complexity,
        ));
        if !analysis.topics.is_empty() {
            out.push_str(&format!("  Topics: {}\n", analysis.topics.join(", ")));
        }
    }

    out
}

/// Formats an accepted validation.
pub fn format_validation(name: &str, kind: DocumentKind, size: u64) -> String {
    format!(
        "{} {} is a valid {} document ({})",
        "✓".green(),
        name.bold(),
        kind.extension(),
        human_bytes(size)
    )
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Formats bytes into human-readable form.
#[allow(clippy::cast_precision_loss)]
pub fn human_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// First line, shortened to `max_len` characters with an ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
