//! Synthetic point-cloud producers.
//!
//! The writer only moves opaque frames; something upstream has to produce
//! them. A [`SyntheticSource`] stands in for a capturer plus encoder: it
//! generates deterministic point-cloud payloads for one (tile, quality)
//! stream at a fixed frame rate and pushes them into that stream's queue.
//!
//! ```text
//!  SyntheticSource(tile, quality) ──enqueue──► FrameQueue ──► PusherWorker
//!         │
//!         └── close() when the frame budget is spent or shutdown is signaled
//! ```

mod synthetic;

pub use synthetic::{
    SourceSummary, SyntheticSource, DEFAULT_FPS, DEFAULT_POINTS_PER_FRAME, MAX_POINTS_PER_FRAME,
    POINT_RECORD_SIZE,
};
