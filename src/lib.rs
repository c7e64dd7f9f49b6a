//! Conversation export and document ingestion pipeline.
//!
//! Uploaded documents are validated, converted to text and folded into a
//! conversation as system messages. Conversations export to PDF, DOCX, plain
//! text or JSON with consistent content across formats.

pub mod application;
pub mod domain;
pub mod http;
pub mod infrastructure;
