//! Receiving side of the TCP transport.
//!
//! Mirrors [`TcpTransport`](crate::transport::TcpTransport): stream `index`
//! arrives on `base_port + index`. Each port gets its own accept task that
//! reassembles packets from the byte stream and forwards them on a shared
//! channel.
//!
//! ```text
//!  base_port + 0 ──► accept task 0 ──┐
//!  base_port + 1 ──► accept task 1 ──┼──► mpsc::Receiver<ReceivedPacket>
//!  base_port + N ──► accept task N ──┘
//! ```

mod tcp;

pub use tcp::{ReceivedPacket, ReceiverHandle, TcpReceiver, DEFAULT_CHANNEL_CAPACITY};
