use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::queue::Frame;

use super::fourcc::FourCC;

/// Size of the packet header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest payload the 32-bit signed length field can describe.
pub const MAX_PAYLOAD_SIZE: usize = i32::MAX as usize;

// =============================================================================
// FrameHeader
// =============================================================================

/// Fixed header prepended to every outgoing payload.
///
/// ```text
/// offset  size  field
///      0     4  fourcc          raw bytes as provided
///      4     4  payload length  little-endian i32
///      8     8  timestamp       little-endian i64
///     16     n  payload         raw bytes
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Media-type code
    pub fourcc: FourCC,

    /// Payload length in bytes
    pub length: i32,

    /// Producer timestamp
    pub timestamp: i64,
}

impl FrameHeader {
    /// Create a header describing `payload_len` bytes.
    ///
    /// Fails if the length does not fit the 32-bit length field.
    pub fn new(fourcc: FourCC, payload_len: usize, timestamp: i64) -> Result<Self, ProtocolError> {
        let length = i32::try_from(payload_len).map_err(|_| ProtocolError::PayloadTooLarge {
            size: payload_len,
            limit: MAX_PAYLOAD_SIZE,
        })?;

        Ok(Self {
            fourcc,
            length,
            timestamp,
        })
    }

    /// Append the 16 header bytes to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(HEADER_SIZE);
        buf.put_slice(&self.fourcc.as_bytes());
        buf.put_i32_le(self.length);
        buf.put_i64_le(self.timestamp);
    }

    /// Encode the header on its own.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.fourcc.as_bytes());
        out[4..8].copy_from_slice(&self.length.to_le_bytes());
        out[8..16].copy_from_slice(&self.timestamp.to_le_bytes());
        out
    }

    /// Decode a header from the first 16 bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                required: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let fourcc = FourCC::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let length = read_i32_le(&bytes[4..8]);
        let timestamp = read_i64_le(&bytes[8..16]);

        if length < 0 {
            return Err(ProtocolError::NegativeLength(length));
        }

        Ok(Self {
            fourcc,
            length,
            timestamp,
        })
    }

    /// Payload length as `usize`.
    ///
    /// Headers built through [`new`](Self::new) or [`decode`](Self::decode)
    /// never carry a negative length.
    pub fn payload_len(&self) -> usize {
        self.length.max(0) as usize
    }
}

/// Build a complete packet (header followed by payload) for `frame`.
///
/// The payload is copied into one contiguous buffer so the transport can
/// transmit it as a single message.
pub fn build_packet(fourcc: FourCC, frame: &Frame) -> Result<Bytes, ProtocolError> {
    let header = FrameHeader::new(fourcc, frame.len(), frame.timestamp)?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + frame.len());
    header.encode_into(&mut buf);
    buf.put_slice(&frame.data);

    Ok(buf.freeze())
}

/// Read a little-endian i32 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 4 bytes.
#[inline]
fn read_i32_le(bytes: &[u8]) -> i32 {
    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Read a little-endian i64 from a byte slice.
///
/// # Panics
/// Panics if the slice has fewer than 8 bytes.
#[inline]
fn read_i64_le(bytes: &[u8]) -> i64 {
    i64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ])
}
