use thiserror::Error;

/// Errors raised while validating writer construction arguments.
///
/// Any of these is fatal to construction: no partially built writer is
/// ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Media-type tag is not exactly four bytes long
    #[error("4CC is \"{0}\" which is not exactly 4 characters")]
    InvalidFourCC(String),

    /// No outgoing streams were supplied
    #[error("stream descriptions are empty")]
    NoStreams,

    /// Destination address does not parse as a URL
    #[error("Invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Two descriptions map onto the same stream index
    #[error("Duplicate stream: tile {tile}, quality {quality} maps to index {index} twice")]
    DuplicateStream { tile: u32, quality: u32, index: u32 },

    /// Computed stream index does not fit in 32 bits
    #[error("Stream index overflow for tile {tile}, quality {quality}")]
    IndexOverflow { tile: u32, quality: u32 },

    /// The queue of this stream is already the queue of another stream
    #[error("Queue of stream {index} is shared with another stream")]
    SharedQueue { index: u32 },
}

/// Errors reported by a transport or one of its sub-channels.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Could not establish the sub-channel
    #[error("Connection error on channel {index}: {reason}")]
    Connect { index: u32, reason: String },

    /// A single packet could not be transmitted; the channel is still usable
    #[error("Send error: {0}")]
    Send(String),

    /// The channel is gone and will not accept further packets
    #[error("Channel closed: {0}")]
    Closed(String),

    /// The endpoint cannot be served by this transport
    #[error("Unsupported endpoint: {0}")]
    Unsupported(String),
}

impl TransportError {
    /// Whether the sub-channel is unusable after this error.
    ///
    /// A worker keeps pumping after a non-fatal error and stops its own
    /// stream after a fatal one.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Send(_))
    }
}

/// Errors related to the packet framing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Not enough bytes to hold a header
    #[error("Truncated header: need {required} bytes, got {actual}")]
    Truncated { required: usize, actual: usize },

    /// Header declares a negative payload length
    #[error("Negative payload length: {0}")]
    NegativeLength(i32),

    /// Payload does not fit the 32-bit length field, or exceeds a receiver limit
    #[error("Payload too large: {size} bytes (limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Errors returned by frame queue operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was closed; no more frames are accepted
    #[error("queue is closed")]
    Closed,

    /// The queue is at capacity
    #[error("queue is full")]
    Full,
}

/// Errors from the writer lifecycle.
#[derive(Debug, Clone, Error)]
pub enum WriterError {
    /// Construction arguments were rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// `start()` was called on a writer that is already running
    #[error("writer already started")]
    AlreadyStarted,

    /// The writer has been stopped and cannot be restarted
    #[error("writer has been stopped")]
    Stopped,
}

/// Errors raised while setting up a [`TcpReceiver`](crate::receiver::TcpReceiver).
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// A listening port could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// `base_port + index` does not fit in 16 bits
    #[error("Port overflow: base port {base_port} + index {index}")]
    PortOverflow { base_port: u16, index: u32 },

    /// No stream indices were requested
    #[error("no stream indices to listen on")]
    NoStreams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_fatality() {
        assert!(!TransportError::Send("timeout".into()).is_fatal());
        assert!(TransportError::Closed("reset".into()).is_fatal());
        assert!(TransportError::Connect {
            index: 2,
            reason: "refused".into()
        }
        .is_fatal());
        assert!(TransportError::Unsupported("udp://x".into()).is_fatal());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::InvalidFourCC("abc".into());
        assert_eq!(
            err.to_string(),
            "4CC is \"abc\" which is not exactly 4 characters"
        );

        let err = ConfigError::DuplicateStream {
            tile: 1,
            quality: 0,
            index: 1,
        };
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_writer_error_from_config() {
        let err: WriterError = ConfigError::NoStreams.into();
        assert!(matches!(err, WriterError::Config(ConfigError::NoStreams)));
    }
}
