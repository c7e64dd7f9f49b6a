//! Domain models for consultation conversations, uploads and exports.
//!
//! These models are shared by the store, the ingestion pipeline and the
//! export renderers. Serialized field names are camelCase to match the
//! front-end's JSON shapes.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AppError, RenderKind, Result};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user (human).
    User,
    /// Message from the remote assistant.
    Assistant,
    /// Pipeline-generated context, e.g. extracted upload content.
    System,
}

impl Role {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Assistant => write!(f, "Assistant"),
            Self::System => write!(f, "System"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            _ => Err(format!("Unknown role: {s}. Use: user, assistant, system")),
        }
    }
}

/// Consultant persona selected when a message was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    General,
    Sap,
    Oracle,
    Dynamics,
    Analyst,
}

impl Persona {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Sap => "sap",
            Self::Oracle => "oracle",
            Self::Dynamics => "dynamics",
            Self::Analyst => "analyst",
        }
    }
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "sap" => Ok(Self::Sap),
            "oracle" => Ok(Self::Oracle),
            "dynamics" => Ok(Self::Dynamics),
            "analyst" => Ok(Self::Analyst),
            _ => Err(format!(
                "Unknown persona: {s}. Use: general, sap, oracle, dynamics, analyst"
            )),
        }
    }
}

/// Coarse complexity bucket for analyzed documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Lightweight structural summary of extracted document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    /// Number of heading-like lines.
    pub section_count: usize,
    /// Whitespace-separated word count.
    pub word_count: usize,
    /// Non-empty line count.
    pub line_count: usize,
    /// Character count of the extracted text.
    pub char_count: usize,
    /// Whether the text looks like rows and columns.
    pub has_tabular_data: bool,
    /// Domain topics mentioned, most frequent first.
    pub topics: Vec<String>,
    /// Complexity bucket derived from length and structure.
    pub complexity: Complexity,
}

/// Record of one processed upload, kept in the stored message's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub file_id: String,
    pub filename: String,
    pub size: u64,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
    /// False when extraction failed and the upload was stored without analysis.
    pub extracted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DocumentAnalysis>,
}

/// Optional per-message metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    /// Marks the message as an analysis result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    /// Marks the message as generated code in the given language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upload_results: Vec<UploadSummary>,
}

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier for this message.
    pub id: String,
    /// Author of the message.
    pub role: Role,
    /// Message text, may contain fenced code blocks.
    pub content: String,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// Create a message with a fresh id and the current time.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Attach metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the timestamp.
    #[must_use]
    pub const fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether the message carries the analysis marker.
    #[must_use]
    pub fn is_analysis(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| m.analysis_type.is_some())
    }

    /// Whether the message carries the generated-code marker.
    #[must_use]
    pub fn is_code(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|m| m.code_language.is_some())
    }

    /// Persona tag, if any.
    #[must_use]
    pub fn persona(&self) -> Option<Persona> {
        self.metadata.as_ref().and_then(|m| m.persona)
    }
}

/// An append-only conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique identifier for this conversation.
    pub id: String,
    /// When this conversation was created.
    pub created_at: DateTime<Utc>,
    /// Messages in append order.
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    /// Get the first message text as a preview.
    #[must_use]
    pub fn preview(&self) -> &str {
        self.messages
            .first()
            .map_or("[Empty conversation]", |m| m.content.as_str())
    }

    /// Get total message count.
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Count messages with the given role.
    #[must_use]
    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Timestamp of the newest message, or the creation time when empty.
    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.messages
            .last()
            .map_or(self.created_at, |m| m.timestamp)
    }

    /// Summary row for listings.
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            message_count: self.message_count(),
            preview: self.preview().to_string(),
        }
    }
}

/// Listing row for a stored conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
    pub preview: String,
}

/// A file received for ingestion. Never persisted.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub content: Vec<u8>,
}

impl UploadedFile {
    /// Build from raw bytes; the size is taken from the content.
    #[must_use]
    pub fn new(
        original_name: impl Into<String>,
        mime_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            mime_type: mime_type.into(),
            size_bytes: content.len() as u64,
            content,
        }
    }

    /// Lowercase extension of the original name, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.original_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
    }
}

/// Outcome of extracting one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    pub extracted_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<DocumentAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl ExtractionResult {
    /// Successful extraction.
    #[must_use]
    pub const fn extracted(text: String, analysis: Option<DocumentAnalysis>) -> Self {
        Self {
            success: true,
            extracted_text: text,
            analysis,
            error_reason: None,
        }
    }

    /// Failed extraction with a reason.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            extracted_text: String::new(),
            analysis: None,
            error_reason: Some(reason.into()),
        }
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Docx,
    Txt,
    Json,
}

impl ExportFormat {
    /// All supported formats.
    pub const ALL: [Self; 4] = [Self::Pdf, Self::Docx, Self::Txt, Self::Json];

    /// File extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }

    /// Standard MIME type.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Txt => "text/plain; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            _ => Err(AppError::render(
                RenderKind::UnknownFormat,
                format!("Unsupported export format: {s}. Use: pdf, docx, txt, json"),
            )),
        }
    }
}

/// A fully validated export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub conversation_id: String,
    pub format: ExportFormat,
    pub include_analysis: bool,
    pub include_code: bool,
    pub title: String,
}

/// Rendered export ready for delivery.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: String,
}

/// Time span covered by a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportDuration {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Export preview, recomputed from the current conversation on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub message_count: usize,
    pub has_analysis: bool,
    pub has_code: bool,
    pub personas_used: BTreeSet<Persona>,
    pub duration: ExportDuration,
    /// Approximate payload size per format; not a commitment.
    pub estimated_size_bytes: BTreeMap<ExportFormat, u64>,
}
