//! Integration tests for the HTTP API.
//!
//! Each test builds its own router over an in-memory store and drives it with
//! `oneshot` requests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use consultation_pipeline::application::Pipeline;
use consultation_pipeline::domain::AppConfig;
use consultation_pipeline::http::{create_router, AppState};
use consultation_pipeline::infrastructure::MemoryStore;

// =============================================================================
// Helpers
// =============================================================================

const BOUNDARY: &str = "consult-test-boundary";

fn make_app_with(config: &AppConfig) -> Router {
    let store = Arc::new(MemoryStore::new(config.storage.max_messages));
    let pipeline = Pipeline::new(store, config);
    create_router(AppState::new(pipeline, config.upload.max_size_bytes))
}

fn make_app() -> Router {
    make_app_with(&AppConfig::default())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

/// Multipart upload with one file field and an optional conversation id.
fn upload_request(
    field: &str,
    filename: &str,
    content_type: &str,
    content: &[u8],
    conversation_id: Option<&str>,
) -> Request<Body> {
    let mut body = Vec::new();
    if let Some(id) = conversation_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"conversationId\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Assert a `{kind, message}` error envelope with the given status and kind.
async fn assert_error(response: axum::response::Response, status: StatusCode, kind: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["kind"], kind, "body: {json}");
    assert!(json["message"].as_str().is_some_and(|m| !m.is_empty()));
}

async fn append(app: &Router, id: &str, message: Value) {
    let response = app
        .clone()
        .oneshot(post_json(&format!("/api/conversations/{id}/messages"), &message))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Three dialogue messages and one generated-code message.
async fn seed_consultation(app: &Router, id: &str) {
    append(app, id, json!({"role": "user", "content": "Reduce order-to-cash cycle time"})).await;
    append(
        app,
        id,
        json!({"role": "assistant", "content": "Start with billing.", "metadata": {"persona": "sap"}}),
    )
    .await;
    append(app, id, json!({"role": "user", "content": "Show me a report skeleton"})).await;
    append(
        app,
        id,
        json!({
            "role": "assistant",
            "content": "```abap\nREPORT z_o2c.\n```",
            "metadata": {"codeLanguage": "abap"}
        }),
    )
    .await;
}

// =============================================================================
// Health and conversations
// =============================================================================

#[tokio::test]
async fn test_health() {
    let response = make_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_create_list_and_get_conversation() {
    let app = make_app();

    let response = app
        .clone()
        .oneshot(Request::post("/api/conversations").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let id = body_json(response).await["id"].as_str().unwrap().to_string();

    append(&app, &id, json!({"role": "user", "content": "hello"})).await;

    let list = body_json(app.clone().oneshot(get("/api/conversations")).await.unwrap()).await;
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["messageCount"], 1);

    let conv = body_json(
        app.clone()
            .oneshot(get(&format!("/api/conversations/{id}")))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(conv["messages"][0]["role"], "user");
    assert_eq!(conv["messages"][0]["content"], "hello");
}

#[tokio::test]
async fn test_unknown_conversation_is_404() {
    let response = make_app()
        .oneshot(get("/api/conversations/does-not-exist"))
        .await
        .unwrap();
    assert_error(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn test_malformed_message_body() {
    let response = make_app()
        .oneshot(
            Request::post("/api/conversations/c1/messages")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"role\": \"robot\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_request").await;
}

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let response = make_app().oneshot(get("/api/nope")).await.unwrap();
    assert_error(response, StatusCode::NOT_FOUND, "not_found").await;
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_txt_is_extracted_and_stored() {
    let app = make_app();
    let content = "Reduce order-to-cash cycle time\n".repeat(64);

    let response = app
        .clone()
        .oneshot(upload_request(
            "document",
            "goals.txt",
            "text/plain",
            content.as_bytes(),
            Some("conv-upload"),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["conversationId"], "conv-upload");
    assert_eq!(json["filename"], "goals.txt");
    assert_eq!(json["content"], content.as_str());
    assert_eq!(json["metadata"]["size"], content.len());
    assert_eq!(json["metadata"]["type"], "text/plain");
    assert!(json["analysis"]["wordCount"].is_u64());
    assert!(json.get("extractionError").is_none());

    let conv = body_json(
        app.oneshot(get("/api/conversations/conv-upload"))
            .await
            .unwrap(),
    )
    .await;
    let stored = &conv["messages"][0];
    assert_eq!(stored["role"], "system");
    assert_eq!(stored["id"], json["messageId"]);
    assert_eq!(
        stored["metadata"]["uploadResults"][0]["fileId"],
        json["fileId"]
    );
}

#[tokio::test]
async fn test_upload_accepts_file_field() {
    let response = make_app()
        .oneshot(upload_request(
            "file",
            "rows.csv",
            "text/csv",
            b"a,b,c\n1,2,3\n4,5,6",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["analysis"]["hasTabularData"], true);
    assert!(json["conversationId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn test_upload_corrupt_pdf_degrades() {
    let response = make_app()
        .oneshot(upload_request(
            "document",
            "broken.pdf",
            "application/pdf",
            b"definitely not a pdf",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["content"], "");
    assert!(json["analysis"].is_null());
    assert!(json["extractionError"].is_string());
}

#[tokio::test]
async fn test_upload_unsupported_type() {
    let response = make_app()
        .oneshot(upload_request(
            "document",
            "notes.rtf",
            "application/rtf",
            b"{\\rtf1 hello}",
            None,
        ))
        .await
        .unwrap();
    assert_error(response, StatusCode::BAD_REQUEST, "unsupported_type").await;
}

#[tokio::test]
async fn test_upload_too_large() {
    let mut config = AppConfig::default();
    config.upload.max_size_bytes = 1024;
    let app = make_app_with(&config);

    let response = app
        .oneshot(upload_request(
            "document",
            "big.txt",
            "text/plain",
            &vec![b'a'; 2048],
            Some("conv-big"),
        ))
        .await
        .unwrap();
    assert_error(response, StatusCode::BAD_REQUEST, "file_too_large").await;
}

#[tokio::test]
async fn test_upload_requires_multipart_body() {
    let response = make_app()
        .oneshot(post_json("/api/upload", &json!({"document": "notes.txt"})))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_request").await;
}

#[tokio::test]
async fn test_upload_without_file() {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"conversationId\"\r\n\r\nc1\r\n--{BOUNDARY}--\r\n"
    );
    let request = Request::post("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = make_app().oneshot(request).await.unwrap();
    assert_error(response, StatusCode::BAD_REQUEST, "missing_field").await;
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn test_export_txt_headers_and_filter() {
    let app = make_app();
    seed_consultation(&app, "conv-x").await;

    let response = app
        .oneshot(post_json(
            "/api/export",
            &json!({"conversationId": "conv-x", "format": "txt", "includeCode": false}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"eva-consultation-conv-x.txt\""
    );

    let bytes = body_bytes(response).await;
    assert_eq!(
        headers[header::CONTENT_LENGTH],
        bytes.len().to_string().as_str()
    );

    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("Messages: 3\n"));
    assert!(text.contains("Reduce order-to-cash cycle time"));
    assert!(!text.contains("REPORT z_o2c."));
}

#[tokio::test]
async fn test_export_every_format() {
    let app = make_app();
    seed_consultation(&app, "conv-f").await;

    for (format, content_type) in [
        ("pdf", "application/pdf"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("json", "application/json"),
    ] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/export",
                &json!({"conversationId": "conv-f", "format": format}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{format}");
        assert_eq!(response.headers()[header::CONTENT_TYPE], content_type);
        assert!(!body_bytes(response).await.is_empty());
    }
}

#[tokio::test]
async fn test_export_unknown_format() {
    let app = make_app();
    seed_consultation(&app, "conv-r").await;

    let response = app
        .oneshot(post_json(
            "/api/export",
            &json!({"conversationId": "conv-r", "format": "rtf"}),
        ))
        .await
        .unwrap();
    assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    assert_error(response, StatusCode::BAD_REQUEST, "unknown_format").await;
}

#[tokio::test]
async fn test_export_missing_fields() {
    let response = make_app()
        .oneshot(post_json("/api/export", &json!({"format": "pdf"})))
        .await
        .unwrap();
    assert_error(response, StatusCode::BAD_REQUEST, "missing_field").await;
}

#[tokio::test]
async fn test_export_unknown_and_empty_conversations() {
    let app = make_app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/export",
            &json!({"conversationId": "ghost", "format": "json"}),
        ))
        .await
        .unwrap();
    assert_error(response, StatusCode::NOT_FOUND, "not_found").await;

    let created = body_json(
        app.clone()
            .oneshot(Request::post("/api/conversations").body(Body::empty()).unwrap())
            .await
            .unwrap(),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let response = app
        .oneshot(post_json(
            "/api/export",
            &json!({"conversationId": id, "format": "pdf"}),
        ))
        .await
        .unwrap();
    assert_error(response, StatusCode::NOT_FOUND, "empty_conversation").await;
}

#[tokio::test]
async fn test_export_metadata() {
    let app = make_app();
    seed_consultation(&app, "conv-m").await;

    let response = app
        .clone()
        .oneshot(get("/api/export?conversationId=conv-m"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["messageCount"], 4);
    assert_eq!(json["hasCode"], true);
    assert_eq!(json["hasAnalysis"], false);
    assert_eq!(json["personasUsed"], json!(["sap"]));
    let sizes = &json["estimatedSizeBytes"];
    assert!(sizes["txt"].as_u64().unwrap() < sizes["pdf"].as_u64().unwrap());

    let response = app.clone().oneshot(get("/api/export")).await.unwrap();
    assert_error(response, StatusCode::BAD_REQUEST, "missing_field").await;

    let response = app
        .oneshot(get("/api/export?conversationId=ghost"))
        .await
        .unwrap();
    assert_error(response, StatusCode::NOT_FOUND, "not_found").await;
}

#[tokio::test]
async fn test_export_metadata_malformed_query() {
    let response = make_app()
        .oneshot(get("/api/export?conversationId=a&conversationId=b"))
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_error(response, StatusCode::BAD_REQUEST, "invalid_request").await;
}
