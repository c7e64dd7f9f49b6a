//! Plain-text transcript export and its parser.
//!
//! Layout:
//!
//! ```text
//! <title>
//! Conversation: <id>
//! Created: <rfc3339>
//! Messages: <n>
//! ========================================
//!
//! [<rfc3339>] User:
//!     first content line
//!     second content line
//!
//! [<rfc3339>] Assistant:
//!     ...
//! ```
//!
//! Content lines are indented by four spaces, so message text can never be
//! mistaken for a header and parsing recovers the content exactly.

use chrono::{DateTime, Utc};

use crate::domain::{AppError, Conversation, Message, Result, Role, ValidationKind};

use super::{clean_title, format_timestamp};

const RULE: &str = "========================================";
const INDENT: &str = "    ";

/// One message recovered from a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

/// Renders the selected messages as a chronological transcript.
pub fn render_transcript(conversation: &Conversation, messages: &[&Message], title: &str) -> String {
    let mut out = String::new();

    out.push_str(&clean_title(title));
    out.push('\n');
    out.push_str(&format!("Conversation: {}\n", conversation.id));
    out.push_str(&format!(
        "Created: {}\n",
        format_timestamp(conversation.created_at)
    ));
    out.push_str(&format!("Messages: {}\n", messages.len()));
    out.push_str(RULE);
    out.push_str("\n\n");

    for message in messages {
        out.push_str(&format!(
            "[{}] {}:\n",
            format_timestamp(message.timestamp),
            message.role
        ));
        for line in message.content.split('\n') {
            out.push_str(INDENT);
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

fn malformed(message: impl Into<String>) -> AppError {
    AppError::validation(ValidationKind::InvalidRequest, message)
}

/// Recovers the ordered messages from a rendered transcript.
///
/// # Errors
/// Returns error if the header rule is missing or a block header is malformed.
pub fn parse_transcript(text: &str) -> Result<Vec<TranscriptEntry>> {
    let lines: Vec<&str> = text.split('\n').collect();
    let body_start = lines
        .iter()
        .skip(1)
        .position(|l| *l == RULE)
        .map(|i| i + 2)
        .ok_or_else(|| malformed("Transcript header rule not found"))?;

    let mut entries = Vec::new();
    let mut current: Option<(Role, DateTime<Utc>, Vec<&str>)> = None;

    for line in &lines[body_start..] {
        if let Some(content) = line.strip_prefix(INDENT) {
            match current.as_mut() {
                Some((_, _, body)) => body.push(content),
                None => return Err(malformed("Content line outside a message block")),
            }
        } else if line.is_empty() {
            if let Some((role, timestamp, body)) = current.take() {
                entries.push(TranscriptEntry {
                    role,
                    timestamp,
                    content: body.join("\n"),
                });
            }
        } else {
            if current.is_some() {
                return Err(malformed(format!("Unterminated message block before: {line}")));
            }
            let (role, timestamp) = parse_header(line)?;
            current = Some((role, timestamp, Vec::new()));
        }
    }

    if let Some((role, timestamp, body)) = current {
        entries.push(TranscriptEntry {
            role,
            timestamp,
            content: body.join("\n"),
        });
    }

    Ok(entries)
}

/// Parses `[<rfc3339>] <Role>:`.
fn parse_header(line: &str) -> Result<(Role, DateTime<Utc>)> {
    let rest = line
        .strip_prefix('[')
        .and_then(|l| l.strip_suffix(':'))
        .ok_or_else(|| malformed(format!("Malformed message header: {line}")))?;
    let (ts, role) = rest
        .split_once("] ")
        .ok_or_else(|| malformed(format!("Malformed message header: {line}")))?;

    let timestamp = DateTime::parse_from_rfc3339(ts)
        .map_err(|e| malformed(format!("Bad timestamp {ts}: {e}")))?
        .with_timezone(&Utc);
    let role = role.parse::<Role>().map_err(malformed)?;

    Ok((role, timestamp))
}
