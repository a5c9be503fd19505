use bytes::{Buf, Bytes, BytesMut};

use crate::error::ProtocolError;

use super::header::{FrameHeader, HEADER_SIZE};

/// Default payload limit for receivers: 64MB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

/// Split a single message-oriented packet into header and payload.
///
/// The packet must contain exactly one header and the payload it announces.
pub fn split_packet(packet: &Bytes) -> Result<(FrameHeader, Bytes), ProtocolError> {
    let header = FrameHeader::decode(packet)?;
    let available = packet.len() - HEADER_SIZE;

    if available < header.payload_len() {
        return Err(ProtocolError::Truncated {
            required: HEADER_SIZE + header.payload_len(),
            actual: packet.len(),
        });
    }

    let payload = packet.slice(HEADER_SIZE..HEADER_SIZE + header.payload_len());
    Ok((header, payload))
}

/// Incremental decoder for packets arriving over a byte stream.
///
/// Stream transports (TCP) deliver arbitrary chunks; the length field in
/// each header makes the framing self-delimiting. Feed chunks with
/// [`push`](Self::push) and pull complete packets with
/// [`next_packet`](Self::next_packet).
#[derive(Debug)]
pub struct PacketDecoder {
    buf: BytesMut,
    max_payload: usize,
}

impl PacketDecoder {
    /// Create a decoder with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a decoder rejecting payloads larger than `max_payload`.
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(64 * 1024),
            max_payload,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Number of buffered bytes not yet returned as packets.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete packet, if one is buffered.
    ///
    /// A header announcing more than the payload limit is an error; the
    /// stream cannot be resynchronised after that.
    pub fn next_packet(&mut self) -> Result<Option<(FrameHeader, Bytes)>, ProtocolError> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = FrameHeader::decode(&self.buf[..HEADER_SIZE])?;
        let payload_len = header.payload_len();
        if payload_len > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                limit: self.max_payload,
            });
        }

        if self.buf.len() < HEADER_SIZE + payload_len {
            self.buf.reserve(HEADER_SIZE + payload_len - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(HEADER_SIZE);
        let payload = self.buf.split_to(payload_len).freeze();
        Ok(Some((header, payload)))
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_packet, FourCC};
    use crate::queue::Frame;

    fn packet(ts: i64, payload: &[u8]) -> Bytes {
        build_packet(FourCC::parse("cwi1").unwrap(), &Frame::new(ts, payload.to_vec())).unwrap()
    }

    #[test]
    fn test_split_packet() {
        let (header, payload) = split_packet(&packet(9, b"hello")).unwrap();
        assert_eq!(header.timestamp, 9);
        assert_eq!(&payload[..], b"hello");
    }

    #[test]
    fn test_split_packet_truncated_payload() {
        let full = packet(9, b"hello");
        let short = full.slice(..full.len() - 1);
        assert!(matches!(
            split_packet(&short),
            Err(ProtocolError::Truncated { .. })
        ));
    }

    #[test]
    fn test_decoder_byte_by_byte() {
        let mut stream = Vec::new();
        stream.extend_from_slice(&packet(1, b"abc"));
        stream.extend_from_slice(&packet(2, b""));
        stream.extend_from_slice(&packet(3, b"defgh"));

        let mut decoder = PacketDecoder::new();
        let mut out = Vec::new();
        for byte in stream {
            decoder.push(&[byte]);
            while let Some((header, payload)) = decoder.next_packet().unwrap() {
                out.push((header.timestamp, payload));
            }
        }

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], (1, Bytes::from_static(b"abc")));
        assert_eq!(out[1], (2, Bytes::new()));
        assert_eq!(out[2], (3, Bytes::from_static(b"defgh")));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_waits_for_full_payload() {
        let full = packet(5, &[7u8; 100]);
        let mut decoder = PacketDecoder::new();

        decoder.push(&full[..50]);
        assert!(decoder.next_packet().unwrap().is_none());

        decoder.push(&full[50..]);
        let (header, payload) = decoder.next_packet().unwrap().unwrap();
        assert_eq!(header.length, 100);
        assert_eq!(payload.len(), 100);
    }

    #[test]
    fn test_decoder_payload_limit() {
        let mut decoder = PacketDecoder::with_max_payload(10);
        decoder.push(&packet(1, &[0u8; 11]));
        assert_eq!(
            decoder.next_packet(),
            Err(ProtocolError::PayloadTooLarge {
                size: 11,
                limit: 10
            })
        );
    }
}
