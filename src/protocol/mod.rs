//! Wire framing for outgoing point-cloud packets.
//!
//! Every payload is sent with a fixed 16-byte header:
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────┬───────────────┐
//! │ fourcc   │ length (LE)  │ timestamp (LE)   │ payload       │
//! │ 4 bytes  │ i32          │ i64              │ length bytes  │
//! └──────────┴──────────────┴──────────────────┴───────────────┘
//! ```
//!
//! The layout is an interoperability contract with existing receivers and
//! must be reproduced bit for bit.

mod decoder;
mod fourcc;
mod header;

pub use decoder::{split_packet, PacketDecoder, DEFAULT_MAX_PAYLOAD};
pub use fourcc::FourCC;
pub use header::{build_packet, FrameHeader, HEADER_SIZE, MAX_PAYLOAD_SIZE};
