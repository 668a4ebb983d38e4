//! Web API server.
//!
//! HTTP surface for the orchestrator, enabled by the `web-api` feature.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/ask` — answer a question (JSON request/response)
//! - `POST /api/v1/feedback` — submit an answer rating (accepted async)
//! - `GET  /api/v1/report` — latency percentiles, cache hit rate, tier mix
//! - `GET  /health` — health check
//! - `GET  /metrics` — Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::feedback::{FeedbackRecord, FeedbackStore};
use crate::metrics;
use crate::orchestrator::{AskRequest, Orchestrator};

/// Configuration for the web API HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address or hostname to bind to (e.g. `"0.0.0.0"`).
    pub host: String,
    /// TCP port the server listens on.
    pub port: u16,
    /// Maximum allowed request body size in bytes.
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8700,
            max_request_size: 64 * 1024,
        }
    }
}

/// JSON body for `POST /api/v1/feedback`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    /// The question that was asked.
    pub question: String,
    /// The answer being rated.
    pub answer: String,
    /// Rating from 1 (poor) to 5 (excellent).
    pub rating: u8,
    /// Conversation the exchange belonged to, if any.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Optional free-text comment.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Shared application state available to all handlers.
struct AppState {
    orchestrator: Arc<Orchestrator>,
    feedback: Arc<FeedbackStore>,
}

/// Start the web API server.
///
/// Binds to `config.host:config.port` and serves until shutdown.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_server(
    config: ServerConfig,
    orchestrator: Arc<Orchestrator>,
    feedback: Arc<FeedbackStore>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.host, config.port);

    let state = Arc::new(AppState {
        orchestrator,
        feedback,
    });

    let app = router(state, config.max_request_size);

    info!("web API ready on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router; separated from [`start_server`] for tests.
fn router(state: Arc<AppState>, max_request_size: usize) -> Router {
    Router::new()
        .route("/api/v1/ask", post(ask_handler))
        .route("/api/v1/feedback", post(feedback_handler))
        .route("/api/v1/report", get(report_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(RequestBodyLimitLayer::new(max_request_size))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> impl IntoResponse {
    if request.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "question must not be empty"})),
        )
            .into_response();
    }

    let response = state.orchestrator.ask(request).await;
    let status = if response.error.is_some() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(response)).into_response()
}

async fn feedback_handler(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<FeedbackSubmission>,
) -> impl IntoResponse {
    let record = FeedbackRecord {
        question: submission.question,
        answer: submission.answer,
        rating: submission.rating,
        session_id: submission.session_id,
        comment: submission.comment,
        timestamp: Utc::now(),
    };

    match state.feedback.submit(record) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"status": "accepted"})),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn report_handler() -> impl IntoResponse {
    Json(metrics::report())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
