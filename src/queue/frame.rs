//! Frame type carried through the per-stream queues.

use bytes::Bytes;

/// One timestamped unit of encoded point-cloud data.
///
/// Frames are produced upstream (by an encoder or capturer) and are never
/// modified by the writer: it only reads the length and timestamp and copies
/// the payload into an outgoing packet. Cloning is cheap because `Bytes` is
/// reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Producer-defined timestamp (typically milliseconds)
    pub timestamp: i64,

    /// Encoded payload
    pub data: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(timestamp: i64, data: impl Into<Bytes>) -> Self {
        Self {
            timestamp,
            data: data.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_from_vec() {
        let frame = Frame::new(42, vec![1u8, 2, 3]);
        assert_eq!(frame.timestamp, 42);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::new(0, Bytes::new());
        assert!(frame.is_empty());
        assert_eq!(frame.len(), 0);
    }
}
