//! Domain-level error types for the consultation pipeline.
//!
//! All errors are typed with `thiserror`. Each variant exposes a
//! machine-readable kind (see [`AppError::kind`]) next to its human-readable
//! message, so every boundary can report the same `{kind, message}` envelope.

use thiserror::Error;

/// Reason an upload or export request was refused before any processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// Upload exceeds the configured size ceiling.
    FileTooLarge,
    /// Extension (or MIME type) is outside the allow-list.
    UnsupportedType,
    /// A required request field is absent or blank.
    MissingField,
    /// Request is syntactically valid but semantically unusable.
    InvalidRequest,
}

impl ValidationKind {
    /// Machine-readable tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileTooLarge => "file_too_large",
            Self::UnsupportedType => "unsupported_type",
            Self::MissingField => "missing_field",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

/// Reason an export could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    /// Requested format is not one of pdf, docx, txt, json.
    UnknownFormat,
    /// Conversation has no messages to export.
    EmptyConversation,
    /// Internal formatting failure while building the document.
    RenderFailed,
}

impl RenderKind {
    /// Machine-readable tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownFormat => "unknown_format",
            Self::EmptyConversation => "empty_conversation",
            Self::RenderFailed => "render_failed",
        }
    }
}

/// Application-level errors with HTTP status mapping in the API layer.
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad input shape, oversized or unsupported file, missing export fields.
    #[error("Validation failed: {message}")]
    Validation {
        kind: ValidationKind,
        message: String,
    },

    /// A binary document could not be parsed.
    #[error("Extraction failed: {message}")]
    Extraction { message: String },

    /// Export could not be rendered.
    #[error("Render failed: {message}")]
    Render { kind: RenderKind, message: String },

    /// Unknown conversation id.
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Failed to open or query the conversation database.
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A pipeline tried to move between states that are not connected.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a validation error.
    pub fn validation(kind: ValidationKind, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            message: message.into(),
        }
    }

    /// Create a render error.
    pub fn render(kind: RenderKind, message: impl Into<String>) -> Self {
        Self::Render {
            kind,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a database error from rusqlite error.
    pub fn database(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Machine-readable error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Validation { kind, .. } => kind.as_str(),
            Self::Extraction { .. } => "extraction_failed",
            Self::Render { kind, .. } => kind.as_str(),
            Self::NotFound { .. } => "not_found",
            Self::Database { .. } => "storage_error",
            Self::JsonParse { .. } => "json_parse_error",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Config { .. } => "config_error",
            Self::Io { .. } => "io_error",
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
