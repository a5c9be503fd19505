//! HTTP status endpoint.
//!
//! Exposes the live statistics of a running writer as JSON.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                       HTTP Layer                        │
//! │          GET /health   GET /streams[/{index}]           │
//! │                                                         │
//! │  ┌─────────────────────┐   ┌─────────────────────────┐  │
//! │  │      handlers       │   │         routes          │  │
//! │  │ (JSON responses)    │   │ (router config)         │  │
//! │  └──────────┬──────────┘   └─────────────────────────┘  │
//! └─────────────┼───────────────────────────────────────────┘
//!               ▼
//!          StatsHandle (shared with the StreamWriter)
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, stream_handler, streams_handler, AppState, ErrorResponse, HealthResponse,
};
pub use routes::{create_router, RouterConfig};
