//! Router configuration for the status endpoint.
//!
//! # Route Structure
//!
//! ```text
//! /health             - Health check
//! /streams            - All streams
//! /streams/{index}    - One stream
//! ```
//!
//! # Example
//!
//! ```ignore
//! let router = create_router(writer.stats_handle(), RouterConfig::new());
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{health_handler, stream_handler, streams_handler, AppState};
use crate::writer::StatsHandle;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// Default configuration: tracing enabled.
    pub fn new() -> Self {
        Self {
            enable_tracing: true,
        }
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the status router for a writer.
pub fn create_router(stats: StatsHandle, config: RouterConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/streams", get(streams_handler))
        .route("/streams/{index}", get(stream_handler))
        .with_state(AppState::new(stats));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}
