//! Bounded frame queues.
//!
//! Producers (encoders, capturers) push [`Frame`]s into a [`FrameQueue`];
//! each queue is drained by exactly one pusher worker. The queue is shared
//! through an `Arc` so that the producer, the writer and the worker can all
//! observe and trigger closure.
//!
//! ```text
//!   producer ──enqueue──► FrameQueue ──dequeue──► pusher worker
//!       │                     ▲
//!       └──────close()────────┘  (end of stream)
//! ```

mod bounded;
mod frame;

pub use bounded::{FrameQueue, OverflowPolicy, DEFAULT_QUEUE_CAPACITY};
pub use frame::Frame;
