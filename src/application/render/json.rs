//! Structured JSON export and re-import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AppError, Conversation, ExportRequest, Message, Result};

use super::clean_title;

/// Inclusion filters recorded in the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    pub include_analysis: bool,
    pub include_code: bool,
}

/// On-disk shape of a JSON export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport {
    pub title: String,
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub options: ExportOptions,
    pub message_count: usize,
    pub messages: Vec<Message>,
}

/// Serializes the selected messages with the export header.
///
/// # Errors
/// Returns error if serialization fails.
pub fn render_json(
    conversation: &Conversation,
    messages: &[&Message],
    request: &ExportRequest,
) -> Result<Vec<u8>> {
    let export = JsonExport {
        title: clean_title(&request.title),
        conversation_id: conversation.id.clone(),
        created_at: conversation.created_at,
        options: ExportOptions {
            include_analysis: request.include_analysis,
            include_code: request.include_code,
        },
        message_count: messages.len(),
        messages: messages.iter().map(|m| (*m).clone()).collect(),
    };

    serde_json::to_vec_pretty(&export).map_err(AppError::json_parse)
}

/// Rebuilds a conversation from a JSON export.
///
/// # Errors
/// Returns error if the payload is not a JSON export.
pub fn import_json(bytes: &[u8]) -> Result<(String, Conversation)> {
    let export: JsonExport = serde_json::from_slice(bytes).map_err(AppError::json_parse)?;

    let conversation = Conversation {
        id: export.conversation_id,
        created_at: export.created_at,
        messages: export.messages,
    };

    Ok((export.title, conversation))
}
