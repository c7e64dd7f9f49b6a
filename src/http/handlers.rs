//! Route handlers.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ExportParams;
use crate::domain::{
    AppError, Conversation, ConversationSummary, DocumentAnalysis, ExportMetadata, Message,
    MessageMetadata, Role, UploadedFile, ValidationKind,
};

use super::error::ApiError;
use super::state::AppState;

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    AppError::not_found("No such route").into()
}

/// POST /api/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let conversation = state.pipeline.create_conversation().await?;
    tracing::info!(conversation = %conversation.id, "Conversation created");
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    Ok(Json(state.pipeline.list_conversations().await?))
}

/// GET /api/conversations/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.pipeline.conversation(&id).await?))
}

/// Body of an appended message.
#[derive(Debug, Deserialize)]
pub struct NewMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
}

/// POST /api/conversations/{id}/messages
pub async fn append_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let Json(body) = payload?;

    let mut message = Message::new(body.role, body.content);
    message.metadata = body.metadata;

    let stored = state.pipeline.append_message(&id, message).await?;
    tracing::debug!(conversation = %id, message = %stored.id, role = %stored.role, "Message appended");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// Upload metadata echoed back to the caller.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Successful upload response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub file_id: String,
    pub conversation_id: String,
    pub message_id: String,
    pub filename: String,
    pub content: String,
    pub analysis: Option<DocumentAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
    pub metadata: UploadMetadata,
}

/// POST /api/upload
///
/// Accepts the file under `document` or `file`, plus an optional
/// `conversationId` text field.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut multipart = multipart?;
    let mut file: Option<UploadedFile> = None;
    let mut conversation_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("document" | "file") => {
                let original_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await?;
                file = Some(UploadedFile::new(original_name, mime_type, bytes.to_vec()));
            }
            Some("conversationId") => {
                conversation_id = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| {
        AppError::validation(ValidationKind::MissingField, "No file uploaded")
    })?;

    let outcome = state.pipeline.upload(file, conversation_id).await?;

    Ok(Json(UploadResponse {
        success: true,
        file_id: outcome.file_id,
        conversation_id: outcome.conversation_id,
        message_id: outcome.message.id,
        filename: outcome.filename,
        content: outcome.extraction.extracted_text,
        analysis: outcome.extraction.analysis,
        extraction_error: outcome.extraction.error_reason,
        metadata: UploadMetadata {
            size: outcome.size,
            mime_type: outcome.mime_type,
            uploaded_at: outcome.uploaded_at,
        },
    }))
}

/// POST /api/export
pub async fn export(
    State(state): State<AppState>,
    payload: Result<Json<ExportParams>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(params) = payload?;
    let request = params.into_request(state.pipeline.default_title())?;
    let artifact = state.pipeline.export(request).await?;

    let headers = [
        (header::CONTENT_TYPE, artifact.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", artifact.filename),
        ),
        (header::CONTENT_LENGTH, artifact.bytes.len().to_string()),
    ];
    Ok((headers, artifact.bytes).into_response())
}

/// Query of the metadata endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataQuery {
    pub conversation_id: Option<String>,
}

/// GET /api/export?conversationId=
pub async fn export_metadata(
    State(state): State<AppState>,
    query: Result<Query<MetadataQuery>, QueryRejection>,
) -> Result<Json<ExportMetadata>, ApiError> {
    let Query(query) = query?;
    let id = query
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            AppError::validation(ValidationKind::MissingField, "conversationId is required")
        })?;

    Ok(Json(state.pipeline.metadata(&id).await?))
}
