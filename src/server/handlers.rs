//! HTTP request handlers for the status endpoint.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /streams` - Statistics for every stream of the writer
//! - `GET /streams/{index}` - Statistics for one stream

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Serialize;
use tracing::debug;

use crate::writer::{StatsHandle, StreamStatsSnapshot};

// =============================================================================
// Application State
// =============================================================================

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Read-only view of the writer's streams
    pub stats: StatsHandle,
}

impl AppState {
    /// Create the state for a writer's stats handle.
    pub fn new(stats: StatsHandle) -> Self {
        Self { stats }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create an error response carrying its status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self
            .status
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle stream list requests.
///
/// # Response
///
/// `200 OK` with a JSON array, one entry per stream in descriptor order:
/// ```json
/// [
///   {
///     "index": 0, "tile": 0, "quality": 0, "state": "running",
///     "frames": 120, "bytes": 1920000, "send_errors": 0,
///     "queue_len": 1, "queue_closed": false, "dropped": 0
///   }
/// ]
/// ```
pub async fn streams_handler(State(state): State<AppState>) -> Json<Vec<StreamStatsSnapshot>> {
    let snapshot = state.stats.snapshot();
    debug!(
        writer = %state.stats.writer_name(),
        streams = snapshot.len(),
        "Serving stream statistics"
    );
    Json(snapshot)
}

/// Handle single-stream requests.
///
/// Returns `404 Not Found` when no stream carries `index`.
pub async fn stream_handler(
    State(state): State<AppState>,
    Path(index): Path<u32>,
) -> Result<Json<StreamStatsSnapshot>, ErrorResponse> {
    state
        .stats
        .snapshot()
        .into_iter()
        .find(|s| s.index == index)
        .map(Json)
        .ok_or_else(|| {
            ErrorResponse::with_status(
                "not_found",
                format!("No stream with index {}", index),
                StatusCode::NOT_FOUND,
            )
        })
}
