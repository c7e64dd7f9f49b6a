//! Application layer - use cases and orchestration.
//!
//! Validation, extraction, rendering and estimation are plain functions;
//! the [`Pipeline`] ties them to a conversation store.

pub mod analysis;
pub mod estimator;
pub mod extractor;
pub mod formatter;
pub mod pipeline;
pub mod render;
pub mod validator;

pub use analysis::analyze;
pub use estimator::estimate_export;
pub use extractor::{extract_document, extract_text, DocumentExtractor, StandardExtractor};
pub use formatter::{
    format_metadata, format_summaries_json, format_summaries_table, format_upload,
    format_validation, human_bytes, OutputFormat,
};
pub use pipeline::{ExportParams, Pipeline, UploadOutcome};
pub use render::{import_json, parse_transcript, render_export, render_transcript};
pub use validator::{DocumentKind, FileValidator};
