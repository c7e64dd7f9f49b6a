//! HTTP surface over the pipeline (axum).

pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::domain::{AppError, Result};

pub use error::{ApiError, ErrorBody};
pub use state::AppState;

/// Room for multipart framing and the other form fields.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route("/api/conversations/{id}", get(handlers::get_conversation))
        .route(
            "/api/conversations/{id}/messages",
            post(handlers::append_message),
        )
        .route("/api/upload", post(handlers::upload))
        .route(
            "/api/export",
            get(handlers::export_metadata).post(handlers::export),
        )
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
///
/// # Errors
/// Returns error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::io(format!("Failed to bind {addr}"), e))?;

    tracing::info!(addr = %addr, "Starting API server");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::io("Server error", e))?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
