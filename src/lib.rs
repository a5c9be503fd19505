//! # pc-streamer
//!
//! A multi-stream writer for tiled, multi-quality point-cloud frames.
//!
//! A capture or encoding pipeline produces one stream of compressed frames
//! per (tile, quality) pair. This library transmits all of those streams to
//! a single endpoint, each on its own transport sub-channel, with a small
//! fixed header in front of every payload.
//!
//! ## Features
//!
//! - **Independent streams**: one bounded queue and one pusher task per
//!   stream, so a slow or failed stream never blocks the others
//! - **Predictable channel layout**: `index = tile + (1 + max tile) * quality`
//! - **Stable wire format**: 4-byte media code, LE i32 length, LE i64 timestamp
//! - **Pluggable transport**: TCP (one port per stream) or in-memory
//! - **Observability**: periodic per-stream statistics and an HTTP status endpoint
//!
//! ## Architecture
//!
//! - [`queue`] - Bounded, closable frame queues
//! - [`protocol`] - Packet header encoding and decoding
//! - [`transport`] - Transport capability and its TCP and in-memory implementations
//! - [`writer`] - Descriptor table, pusher workers and the writer façade
//! - [`source`] - Synthetic point-cloud producers
//! - [`receiver`] - TCP receiving side
//! - [`server`] - Axum-based status endpoint
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pc_streamer::{Frame, FrameQueue, OutgoingStream, StreamWriter, TcpTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queues: Vec<_> = (0..4)
//!         .map(|i| Arc::new(FrameQueue::new(format!("stream{}", i), 4)))
//!         .collect();
//!
//!     // Two tiles at two quality levels: indices 0, 1, 2, 3
//!     let streams = vec![
//!         OutgoingStream::new(0, 0, Arc::clone(&queues[0])),
//!         OutgoingStream::new(1, 0, Arc::clone(&queues[1])),
//!         OutgoingStream::new(0, 1, Arc::clone(&queues[2])),
//!         OutgoingStream::new(1, 1, Arc::clone(&queues[3])),
//!     ];
//!
//!     let mut writer =
//!         StreamWriter::new("tcp://127.0.0.1:9000", "cwi1", streams, TcpTransport::new())?;
//!     writer.start()?;
//!
//!     queues[0].enqueue(Frame::new(0, vec![0u8; 1024])).await?;
//!
//!     for queue in &queues {
//!         queue.close();
//!     }
//!     writer.stop().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod receiver;
pub mod server;
pub mod source;
pub mod transport;
pub mod writer;

// Re-export commonly used types
pub use config::{Cli, Command, ReceiveConfig, SendConfig};
pub use error::{ConfigError, ProtocolError, QueueError, ReceiverError, TransportError, WriterError};
pub use protocol::{build_packet, split_packet, FourCC, FrameHeader, PacketDecoder, HEADER_SIZE};
pub use queue::{Frame, FrameQueue, OverflowPolicy};
pub use receiver::{ReceivedPacket, TcpReceiver};
pub use server::{create_router, RouterConfig};
pub use source::SyntheticSource;
pub use transport::{MemoryTransport, SubChannel, TcpTransport, Transport};
pub use writer::{
    DescriptorTable, OutgoingStream, StatsHandle, StopReport, StreamDescriptor, StreamWriter,
    WriterConfig,
};
