//! Multi-stream writer.
//!
//! A [`StreamWriter`] transmits several independent streams of point-cloud
//! frames (one per spatial tile and quality level) to a single endpoint.
//! Each stream gets its own [`PusherWorker`], which pulls frames from the
//! stream's queue, prefixes them with a packet header and sends them on the
//! stream's own transport sub-channel.
//!
//! # Architecture
//!
//! ```text
//!  producer 0 ──► FrameQueue 0 ──► PusherWorker 0 ──► sub-channel 0 ─┐
//!  producer 1 ──► FrameQueue 1 ──► PusherWorker 1 ──► sub-channel 1 ─┼─► endpoint
//!  producer N ──► FrameQueue N ──► PusherWorker N ──► sub-channel N ─┘
//!                                        │
//!                                  StreamStatus ──► StatsHandle ──► /streams
//! ```
//!
//! Streams never share a queue or a sub-channel, so a stalled or failed
//! stream does not hold back the others.

mod descriptor;
mod pusher;
mod stats;
mod stream_writer;

pub use descriptor::{stream_index, DescriptorTable, OutgoingStream, StreamDescriptor};
pub use pusher::{ExitReason, PusherHandle, PusherWorker, WorkerExit};
pub use stats::{
    IntervalReport, IntervalStats, StreamStatsSnapshot, StreamStatus, WorkerState,
    DEFAULT_STATS_INTERVAL,
};
pub use stream_writer::{StatsHandle, StopReport, StreamWriter, WriterConfig};
