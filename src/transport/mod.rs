//! Transport capability used by the pusher workers.
//!
//! The writer does not know how packets travel; it is handed a
//! [`Transport`] at construction time and asks it for one [`SubChannel`] per
//! stream index. Connection establishment (handshakes, signaling) is the
//! transport's business.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              StreamWriter               │
//! │   (one pusher worker per stream index)  │
//! └────────────────────┬────────────────────┘
//!                      │ open_channel(url, index)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             Transport Trait             │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │  TcpTransport   │    │  MemoryTransport    │
//! │ (port per index)│    │ (in-process, tests) │
//! └─────────────────┘    └─────────────────────┘
//! ```
//!
//! Each sub-channel is owned by exactly one worker; nothing is shared
//! between streams beyond the transport value itself.

mod memory;
mod tcp;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::error::TransportError;

pub use memory::{MemoryChannel, MemoryTransport};
pub use tcp::{channel_address, TcpChannel, TcpTransport, DEFAULT_CONNECT_TIMEOUT};

/// Factory for per-stream sub-channels.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// The sub-channel type this transport opens.
    type Channel: SubChannel;

    /// Open the sub-channel carrying stream `index` towards `endpoint`.
    async fn open_channel(&self, endpoint: &Url, index: u32)
        -> Result<Self::Channel, TransportError>;

    /// Short name for logging.
    fn kind(&self) -> &'static str;
}

/// One open path for the packets of a single stream.
#[async_trait]
pub trait SubChannel: Send + 'static {
    /// Transmit one complete packet (header and payload).
    async fn send(&mut self, packet: Bytes) -> Result<(), TransportError>;

    /// Release the sub-channel. Further sends fail.
    async fn close(&mut self) -> Result<(), TransportError>;
}
