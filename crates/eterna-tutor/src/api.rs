//! HTTP API for the web chat surface.
//!
//! # Endpoints
//!
//! - `POST /api/chat` - Send a message and receive the tutor's reply
//! - `GET /api/students/:id/progress` - Read a student's progress summary
//! - `GET /api/health` - Liveness and active session count
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eterna_tutor::{build_model, create_router, AppState, Config, MemoryBank, Tutor};
//!
//! # async fn example() -> eterna_tutor::Result<()> {
//! let config = Config::default();
//! let bank = Arc::new(MemoryBank::open_file(&config.memory_bank_path).await?);
//! let tutor = Arc::new(Tutor::new(&config, build_model(&config.model)?, bank));
//!
//! let router = create_router(AppState::new(tutor, config.student_id.clone()));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::tutor::Tutor;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Student sending the message. Defaults to the configured student.
    #[serde(default)]
    pub student_id: Option<String>,
    /// The message text.
    pub message: String,
}

/// Response body for the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Routed intent name.
    pub intent: String,
    /// Markdown reply.
    pub reply: String,
    /// Session that handled the message.
    pub session_id: Option<String>,
}

/// Aggregate statistics in a progress response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    /// Distinct topics covered.
    pub total_topics: usize,
    /// Quizzes completed.
    pub total_quizzes: usize,
    /// Mean quiz score in `[0, 1]`.
    pub average_score: f64,
}

/// Response body for the progress endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    /// The student the summary is for.
    pub student_id: String,
    /// Rendered progress report.
    pub summary: String,
    /// Aggregate statistics.
    pub stats: ProgressStats,
}

/// Response body for the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the server is up.
    pub status: String,
    /// Sessions that have not expired.
    pub active_sessions: usize,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// The tutoring service.
    pub tutor: Arc<Tutor>,
    /// Student used when a chat request does not name one.
    pub default_student_id: String,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub fn new(tutor: Arc<Tutor>, default_student_id: impl Into<String>) -> Self {
        Self {
            tutor,
            default_student_id: default_student_id.into(),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The request was well-formed JSON but not acceptable.
    InvalidRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints under `/api`, plus
/// permissive CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/chat", post(handle_chat))
        .route("/students/:id/progress", get(handle_progress))
        .route("/health", get(handle_health));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /api/chat`.
async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let student_id = request
        .student_id
        .unwrap_or_else(|| state.default_student_id.clone());
    if student_id.trim().is_empty() {
        warn!("Rejected chat request with blank studentId");
        return Err(ApiError::InvalidRequest(
            "studentId must not be blank".to_string(),
        ));
    }

    info!(student_id = %student_id, message_len = request.message.len(), "Received chat message");

    let reply = state
        .tutor
        .handle_message(&student_id, &request.message)
        .await;

    Ok(Json(ChatResponse {
        intent: reply.intent.to_string(),
        reply: reply.text,
        session_id: reply.session_id,
    }))
}

/// Handler for `GET /api/students/:id/progress`. Never creates a profile.
async fn handle_progress(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<String>,
) -> Json<ProgressResponse> {
    let summary = state.tutor.progress_report(&student_id).await;
    let stats = state
        .tutor
        .bank()
        .find_profile(&student_id)
        .await
        .map(|profile| ProgressStats {
            total_topics: profile.stats.total_topics,
            total_quizzes: profile.stats.total_quizzes,
            average_score: profile.stats.average_score,
        })
        .unwrap_or_default();

    Json(ProgressResponse {
        student_id,
        summary,
        stats,
    })
}

/// Handler for `GET /api/health`.
async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.tutor.active_sessions().await,
    })
}

// ============================================================================
// Tests
// ============================================================================
