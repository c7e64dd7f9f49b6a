//! Domain layer - core types, configuration and error taxonomy.
//!
//! This layer contains pure domain models and pipeline states
//! without any I/O.

pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod store;

pub use config::{
    AppConfig, ExportConfig, PathConfig, ServerConfig, StorageConfig, StoreBackend, UploadConfig,
    DEFAULT_MAX_UPLOAD_BYTES,
};
pub use error::{AppError, RenderKind, Result, ValidationKind};
pub use models::{
    Complexity, Conversation, ConversationSummary, DocumentAnalysis, ExportArtifact,
    ExportDuration, ExportFormat, ExportMetadata, ExportRequest, ExtractionResult, Message,
    MessageMetadata, Persona, Role, UploadSummary, UploadedFile,
};
pub use state::{ExportState, Lifecycle, Tracker, UploadState};
pub use store::ConversationStore;
