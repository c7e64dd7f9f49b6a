//! Pipeline coordinator.
//!
//! Orchestrates upload -> validate -> extract -> store, and
//! snapshot -> estimate -> render -> deliver. Every request walks its own
//! [`Tracker`], so an out-of-order step is an error rather than a silent
//! skip. Extraction and rendering run on the blocking pool under a timeout;
//! the store is touched only once the work is finished. Store calls also go
//! through the blocking pool, since `SQLite` access is synchronous.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{
    AppConfig, AppError, Conversation, ConversationStore, ConversationSummary, ExportArtifact,
    ExportFormat, ExportMetadata, ExportRequest, ExportState, ExtractionResult, Message,
    MessageMetadata, RenderKind, Result, Role, Tracker, UploadState, UploadSummary, UploadedFile,
    ValidationKind,
};

use super::estimator::estimate_export;
use super::extractor::{DocumentExtractor, StandardExtractor};
use super::render::render_export;
use super::validator::{DocumentKind, FileValidator};

/// Raw export parameters as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportParams {
    pub conversation_id: Option<String>,
    pub format: Option<String>,
    pub include_analysis: Option<bool>,
    pub include_code: Option<bool>,
    pub title: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ExportParams {
    /// Validates the parameters. Both inclusion flags default to true and a
    /// blank title falls back to `default_title`.
    ///
    /// # Errors
    /// Returns `MissingField` when the id or format is absent, and
    /// `UnknownFormat` for an unsupported format.
    pub fn into_request(self, default_title: &str) -> Result<ExportRequest> {
        let conversation_id = non_blank(self.conversation_id).ok_or_else(|| {
            AppError::validation(ValidationKind::MissingField, "conversationId is required")
        })?;
        let format = non_blank(self.format)
            .ok_or_else(|| AppError::validation(ValidationKind::MissingField, "format is required"))?
            .parse::<ExportFormat>()?;

        Ok(ExportRequest {
            conversation_id,
            format,
            include_analysis: self.include_analysis.unwrap_or(true),
            include_code: self.include_code.unwrap_or(true),
            title: non_blank(self.title).unwrap_or_else(|| default_title.to_string()),
        })
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub file_id: String,
    pub conversation_id: String,
    /// The system message appended to the conversation.
    pub message: Message,
    pub filename: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub extraction: ExtractionResult,
    /// `Stored` or `StoredWithoutAnalysis`.
    pub state: UploadState,
}

/// Coordinates validation, extraction, storage and export.
pub struct Pipeline {
    store: Arc<dyn ConversationStore>,
    validator: FileValidator,
    extractor: Arc<dyn DocumentExtractor>,
    extraction_timeout: Duration,
    render_timeout: Duration,
    filename_prefix: String,
    default_title: String,
}

impl Pipeline {
    /// Build a coordinator over `store` using the configured policy.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, config: &AppConfig) -> Self {
        Self {
            store,
            validator: FileValidator::new(config.upload.max_size_bytes),
            extractor: Arc::new(StandardExtractor),
            extraction_timeout: Duration::from_secs(config.server.extraction_timeout_secs),
            render_timeout: Duration::from_secs(config.server.render_timeout_secs),
            filename_prefix: config.export.filename_prefix.clone(),
            default_title: config.export.default_title.clone(),
        }
    }

    /// Replace the document extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Override the extraction and render timeouts.
    #[must_use]
    pub const fn with_timeouts(mut self, extraction: Duration, render: Duration) -> Self {
        self.extraction_timeout = extraction;
        self.render_timeout = render;
        self
    }

    /// The backing conversation store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Title used when an export request leaves it blank.
    #[must_use]
    pub fn default_title(&self) -> &str {
        &self.default_title
    }

    /// Runs a store operation on the blocking pool.
    async fn with_store<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ConversationStore) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .map_err(|e| AppError::Database {
                message: format!("Store task failed: {e}"),
                source: None,
            })?
    }

    /// Create an empty conversation.
    ///
    /// # Errors
    /// Returns storage errors.
    pub async fn create_conversation(&self) -> Result<Conversation> {
        self.with_store(|store| store.create()).await
    }

    /// Summaries of every stored conversation.
    ///
    /// # Errors
    /// Returns storage errors.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        self.with_store(|store| store.list()).await
    }

    /// Snapshot of one conversation.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown conversations.
    pub async fn conversation(&self, id: &str) -> Result<Conversation> {
        let id = id.to_string();
        self.with_store(move |store| store.get(&id)).await
    }

    /// Append a message, creating the conversation if needed.
    ///
    /// # Errors
    /// Returns storage errors.
    pub async fn append_message(&self, id: &str, message: Message) -> Result<Message> {
        let id = id.to_string();
        self.with_store(move |store| store.append(&id, message)).await
    }

    /// Run only the validator.
    ///
    /// # Errors
    /// Returns `FileTooLarge` or `UnsupportedType`.
    pub fn validate(&self, file: &UploadedFile) -> Result<DocumentKind> {
        self.validator.validate(file)
    }

    /// Validate, extract and store an upload as a system message.
    ///
    /// A failed or timed-out extraction still stores the upload, without
    /// analysis. A rejected upload never reaches the extractor or the store.
    ///
    /// # Errors
    /// Returns validation errors for rejected files and storage errors if the
    /// message cannot be appended.
    pub async fn upload(
        &self,
        file: UploadedFile,
        conversation_id: Option<String>,
    ) -> Result<UploadOutcome> {
        let file_id = Uuid::new_v4().to_string();
        let mut tracker = Tracker::new(format!("upload {file_id}"), UploadState::Received);
        tracker.advance(UploadState::Validating)?;

        let kind = match self.validator.validate(&file) {
            Ok(kind) => {
                tracker.advance(UploadState::Valid)?;
                kind
            }
            Err(e) => {
                tracker.advance(UploadState::Invalid)?;
                tracker.advance(UploadState::Rejected)?;
                tracing::warn!(
                    file = %file.original_name,
                    size = file.size_bytes,
                    kind = e.kind(),
                    "Upload rejected"
                );
                return Err(e);
            }
        };

        let filename = file.original_name.clone();
        let mime_type = file.mime_type.clone();
        let size = file.size_bytes;
        let uploaded_at = Utc::now();

        tracker.advance(UploadState::Extracting)?;
        let extraction = self.run_extraction(file, kind).await;

        let final_state = if extraction.success {
            tracker.advance(UploadState::Extracted)?;
            UploadState::Stored
        } else {
            tracker.advance(UploadState::ExtractionFailed)?;
            UploadState::StoredWithoutAnalysis
        };

        let conversation_id =
            non_blank(conversation_id).unwrap_or_else(|| Uuid::new_v4().to_string());
        let summary = UploadSummary {
            file_id: file_id.clone(),
            filename: filename.clone(),
            size,
            mime_type: mime_type.clone(),
            uploaded_at,
            extracted: extraction.success,
            analysis: extraction.analysis.clone(),
        };
        let message = Message::new(Role::System, upload_message(&filename, &extraction))
            .at(uploaded_at)
            .with_metadata(MessageMetadata {
                upload_results: vec![summary],
                ..Default::default()
            });

        let message = self.append_message(&conversation_id, message).await?;
        tracker.advance(final_state)?;

        tracing::info!(
            file = %filename,
            conversation = %conversation_id,
            state = ?final_state,
            "Upload stored"
        );

        Ok(UploadOutcome {
            file_id,
            conversation_id,
            message,
            filename,
            mime_type,
            size,
            uploaded_at,
            extraction,
            state: final_state,
        })
    }

    async fn run_extraction(&self, file: UploadedFile, kind: DocumentKind) -> ExtractionResult {
        let extractor = Arc::clone(&self.extractor);
        let name = file.original_name.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&file, kind));

        match tokio::time::timeout(self.extraction_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(file = %name, error = %e, "Extraction task aborted");
                ExtractionResult::failed(format!("Extraction task failed: {e}"))
            }
            Err(_) => {
                tracing::warn!(
                    file = %name,
                    timeout_ms = self.extraction_timeout.as_millis(),
                    "Extraction timed out"
                );
                ExtractionResult::failed(format!(
                    "Extraction timed out after {} ms",
                    self.extraction_timeout.as_millis()
                ))
            }
        }
    }

    /// Render an export of the current conversation snapshot.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown conversations, `EmptyConversation` when
    /// there is nothing to export, and `RenderFailed` on backend failure or
    /// timeout. No partial artifact is ever returned.
    pub async fn export(&self, request: ExportRequest) -> Result<ExportArtifact> {
        let mut tracker = Tracker::new(
            format!("export {}", request.conversation_id),
            ExportState::Requested,
        );

        let outcome = self.render_snapshot(&request, &mut tracker).await;
        match &outcome {
            Ok(artifact) => {
                tracker.advance(ExportState::Delivered)?;
                tracing::info!(
                    conversation = %request.conversation_id,
                    format = %request.format,
                    bytes = artifact.bytes.len(),
                    "Export delivered"
                );
            }
            Err(e) => {
                tracker.advance(ExportState::Failed)?;
                tracing::warn!(
                    conversation = %request.conversation_id,
                    format = %request.format,
                    kind = e.kind(),
                    "Export failed"
                );
            }
        }
        outcome
    }

    async fn render_snapshot(
        &self,
        request: &ExportRequest,
        tracker: &mut Tracker<ExportState>,
    ) -> Result<ExportArtifact> {
        let conversation = self.conversation(&request.conversation_id).await?;

        tracker.advance(ExportState::Estimating)?;
        let estimate = estimate_export(&conversation)?;
        tracing::debug!(
            conversation = %conversation.id,
            messages = estimate.message_count,
            estimated_bytes = estimate.estimated_size_bytes.get(&request.format).copied(),
            "Export estimated"
        );

        tracker.advance(ExportState::Rendering)?;
        let prefix = self.filename_prefix.clone();
        let owned = request.clone();
        let task =
            tokio::task::spawn_blocking(move || render_export(&conversation, &owned, &prefix));

        match tokio::time::timeout(self.render_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(AppError::render(
                RenderKind::RenderFailed,
                format!("Render task failed: {e}"),
            )),
            Err(_) => Err(AppError::render(
                RenderKind::RenderFailed,
                format!(
                    "Render timed out after {} ms",
                    self.render_timeout.as_millis()
                ),
            )),
        }
    }

    /// Export preview for a conversation.
    ///
    /// # Errors
    /// Returns `NotFound` for unknown conversations.
    pub async fn metadata(&self, conversation_id: &str) -> Result<ExportMetadata> {
        let conversation = self.conversation(conversation_id).await?;
        estimate_export(&conversation)
    }
}

/// Content of the system message recording an upload.
fn upload_message(filename: &str, extraction: &ExtractionResult) -> String {
    match &extraction.error_reason {
        None if extraction.extracted_text.is_empty() => {
            format!("Uploaded document {filename} (no text content).")
        }
        None => format!(
            "Uploaded document {filename}.\n\n{}",
            extraction.extracted_text
        ),
        Some(reason) => format!(
            "Uploaded document {filename}. Content could not be extracted: {reason}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::application::render::parse_transcript;
    use crate::domain::{Persona, ValidationKind};
    use crate::infrastructure::MemoryStore;

    struct CountingExtractor {
        calls: AtomicUsize,
    }

    impl DocumentExtractor for CountingExtractor {
        fn extract(&self, file: &UploadedFile, kind: DocumentKind) -> ExtractionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StandardExtractor.extract(file, kind)
        }
    }

    struct SlowExtractor;

    impl DocumentExtractor for SlowExtractor {
        fn extract(&self, _file: &UploadedFile, _kind: DocumentKind) -> ExtractionResult {
            std::thread::sleep(Duration::from_millis(300));
            ExtractionResult::extracted("late".into(), None)
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Arc::new(MemoryStore::new(500)), &AppConfig::default())
    }

    #[tokio::test]
    async fn test_txt_upload_is_stored_with_content() {
        let pipeline = pipeline();
        let content = "Reduce order-to-cash cycle time\n".repeat(64);
        let file = UploadedFile::new("goals.txt", "text/plain", content.clone().into_bytes());

        let outcome = pipeline.upload(file, Some("conv-a".into())).await.unwrap();
        assert_eq!(outcome.state, UploadState::Stored);
        assert!(outcome.extraction.success);
        assert_eq!(outcome.extraction.extracted_text, content);

        let conv = pipeline.store().get("conv-a").unwrap();
        assert_eq!(conv.messages.len(), 1);
        let stored = &conv.messages[0];
        assert_eq!(stored.role, Role::System);
        assert!(stored.content.contains("Reduce order-to-cash cycle time"));
        let results = &stored.metadata.as_ref().unwrap().upload_results;
        assert_eq!(results[0].filename, "goals.txt");
        assert!(results[0].extracted);
        assert!(results[0].analysis.is_some());
    }

    #[tokio::test]
    async fn test_oversized_pdf_never_reaches_extractor() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicUsize::new(0),
        });
        let pipeline = pipeline().with_extractor(extractor.clone());
        let file = UploadedFile::new("huge.pdf", "application/pdf", vec![0; 15 * 1024 * 1024]);

        let err = pipeline.upload(file, Some("conv-b".into())).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation {
                kind: ValidationKind::FileTooLarge,
                ..
            }
        ));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.store().get("conv-b").is_err());
    }

    #[tokio::test]
    async fn test_failed_extraction_is_stored_without_analysis() {
        let pipeline = pipeline();
        let file = UploadedFile::new("broken.pdf", "application/pdf", b"not a pdf".to_vec());

        let outcome = pipeline.upload(file, None).await.unwrap();
        assert_eq!(outcome.state, UploadState::StoredWithoutAnalysis);
        assert!(outcome.extraction.error_reason.is_some());

        let conv = pipeline.store().get(&outcome.conversation_id).unwrap();
        let summary = &conv.messages[0].metadata.as_ref().unwrap().upload_results[0];
        assert!(!summary.extracted);
        assert!(summary.analysis.is_none());
    }

    #[tokio::test]
    async fn test_extraction_timeout_degrades() {
        let pipeline = pipeline()
            .with_extractor(Arc::new(SlowExtractor))
            .with_timeouts(Duration::from_millis(20), Duration::from_secs(5));
        let file = UploadedFile::new("notes.txt", "text/plain", b"slow".to_vec());

        let outcome = pipeline.upload(file, None).await.unwrap();
        assert_eq!(outcome.state, UploadState::StoredWithoutAnalysis);
        assert!(outcome
            .extraction
            .error_reason
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_export_without_code_keeps_dialogue() {
        let pipeline = pipeline();
        let store = pipeline.store();
        store
            .append("conv-c", Message::new(Role::User, "Plan the S/4HANA cutover"))
            .unwrap();
        store
            .append(
                "conv-c",
                Message::new(Role::Assistant, "Freeze master data first.").with_metadata(
                    MessageMetadata {
                        persona: Some(Persona::Sap),
                        ..Default::default()
                    },
                ),
            )
            .unwrap();
        store
            .append("conv-c", Message::new(Role::User, "Give me a check program"))
            .unwrap();
        store
            .append(
                "conv-c",
                Message::new(Role::Assistant, "```abap\nREPORT z_check.\n```").with_metadata(
                    MessageMetadata {
                        code_language: Some("abap".into()),
                        ..Default::default()
                    },
                ),
            )
            .unwrap();

        let request = ExportParams {
            conversation_id: Some("conv-c".into()),
            format: Some("txt".into()),
            include_code: Some(false),
            ..Default::default()
        }
        .into_request(pipeline.default_title())
        .unwrap();

        let artifact = pipeline.export(request).await.unwrap();
        assert_eq!(artifact.filename, "eva-consultation-conv-c.txt");

        let text = String::from_utf8(artifact.bytes).unwrap();
        let entries = parse_transcript(&text).unwrap();
        let roles: Vec<Role> = entries.iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert!(!text.contains("REPORT z_check."));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let err = ExportParams {
            conversation_id: Some("conv-d".into()),
            format: Some("rtf".into()),
            ..Default::default()
        }
        .into_request("EVA Consultation")
        .unwrap_err();
        assert_eq!(err.kind(), "unknown_format");
    }

    #[test]
    fn test_missing_fields() {
        let err = ExportParams::default()
            .into_request("EVA Consultation")
            .unwrap_err();
        assert_eq!(err.kind(), "missing_field");

        let request = ExportParams {
            conversation_id: Some("c".into()),
            format: Some("json".into()),
            title: Some("   ".into()),
            ..Default::default()
        }
        .into_request("EVA Consultation")
        .unwrap();
        assert_eq!(request.title, "EVA Consultation");
        assert!(request.include_analysis);
    }

    #[tokio::test]
    async fn test_export_unknown_and_empty() {
        let pipeline = pipeline();
        let request = |id: &str| ExportRequest {
            conversation_id: id.to_string(),
            format: ExportFormat::Pdf,
            include_analysis: true,
            include_code: true,
            title: "t".into(),
        };

        let err = pipeline.export(request("missing")).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");

        let empty = pipeline.store().create().unwrap();
        let err = pipeline.export(request(&empty.id)).await.unwrap_err();
        assert_eq!(err.kind(), "empty_conversation");

        assert_eq!(pipeline.metadata(&empty.id).await.unwrap().message_count, 0);
    }

    /// Memory store whose reads block the calling thread.
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    impl ConversationStore for SlowStore {
        fn create(&self) -> Result<Conversation> {
            self.inner.create()
        }

        fn get(&self, id: &str) -> Result<Conversation> {
            std::thread::sleep(self.delay);
            self.inner.get(id)
        }

        fn append(&self, id: &str, message: Message) -> Result<Message> {
            self.inner.append(id, message)
        }

        fn list(&self) -> Result<Vec<ConversationSummary>> {
            self.inner.list()
        }

        fn import(&self, conversation: Conversation) -> Result<()> {
            self.inner.import(conversation)
        }
    }

    #[tokio::test]
    async fn test_store_calls_leave_the_runtime_free() {
        let store = Arc::new(SlowStore {
            inner: MemoryStore::new(10),
            delay: Duration::from_millis(400),
        });
        let pipeline = Pipeline::new(store, &AppConfig::default());
        pipeline
            .append_message("conv-s", Message::new(Role::User, "hello"))
            .await
            .unwrap();

        let started = std::time::Instant::now();
        let (meta, ticked) = tokio::join!(pipeline.metadata("conv-s"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            started.elapsed()
        });

        assert_eq!(meta.unwrap().message_count, 1);
        assert!(ticked < Duration::from_millis(300), "timer stalled for {ticked:?}");
    }

    #[tokio::test]
    async fn test_conversation_crud_through_pipeline() {
        let pipeline = pipeline();
        let created = pipeline.create_conversation().await.unwrap();
        pipeline
            .append_message(&created.id, Message::new(Role::User, "first"))
            .await
            .unwrap();

        let conv = pipeline.conversation(&created.id).await.unwrap();
        assert_eq!(conv.messages[0].content, "first");
        let listed = pipeline.list_conversations().await.unwrap();
        assert_eq!(listed[0].message_count, 1);
        assert_eq!(
            pipeline.conversation("ghost").await.unwrap_err().kind(),
            "not_found"
        );
    }
}
