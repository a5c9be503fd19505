//! TCP transport: one connection per stream index.
//!
//! For an endpoint `tcp://host:port`, the sub-channel for stream `N`
//! connects to `host:(port + N)`. A receiver therefore knows which tile and
//! quality a connection carries from the port alone. Packets are written
//! back to back; the length field in each header delimits them.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;
use url::Url;

use crate::error::TransportError;

use super::{SubChannel, Transport};

/// Default time allowed to establish each connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolve the `host:port` pair serving stream `index`.
pub fn channel_address(endpoint: &Url, index: u32) -> Result<(String, u16), TransportError> {
    if endpoint.scheme() != "tcp" {
        return Err(TransportError::Unsupported(format!(
            "{} (expected tcp:// scheme)",
            endpoint
        )));
    }

    let host = endpoint
        .host_str()
        .ok_or_else(|| TransportError::Unsupported(format!("{} (missing host)", endpoint)))?;
    let base = endpoint
        .port()
        .ok_or_else(|| TransportError::Unsupported(format!("{} (missing port)", endpoint)))?;

    let port = u32::from(base)
        .checked_add(index)
        .and_then(|port| u16::try_from(port).ok())
        .ok_or_else(|| {
            TransportError::Unsupported(format!(
                "{} (port {} + index {} exceeds 65535)",
                endpoint, base, index
            ))
        })?;

    // IPv6 literals come back bracketed from the url crate
    let host = host.trim_start_matches('[').trim_end_matches(']');

    Ok((host.to_string(), port))
}

// =============================================================================
// TcpTransport
// =============================================================================

/// Transport that opens one TCP connection per stream.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    nodelay: bool,
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport with Nagle disabled and the default connect timeout.
    pub fn new() -> Self {
        Self {
            nodelay: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Enable or disable TCP_NODELAY on each connection.
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Channel = TcpChannel;

    async fn open_channel(
        &self,
        endpoint: &Url,
        index: u32,
    ) -> Result<Self::Channel, TransportError> {
        let (host, port) = channel_address(endpoint, index)?;

        let connect = TcpStream::connect((host.as_str(), port));
        let stream = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(TransportError::Connect {
                    index,
                    reason: format!("{}:{}: {}", host, port, e),
                })
            }
            Err(_) => {
                return Err(TransportError::Connect {
                    index,
                    reason: format!(
                        "{}:{}: timed out after {:?}",
                        host, port, self.connect_timeout
                    ),
                })
            }
        };

        if self.nodelay {
            stream.set_nodelay(true).map_err(|e| TransportError::Connect {
                index,
                reason: format!("failed to set TCP_NODELAY: {}", e),
            })?;
        }

        debug!(index, host = %host, port, "TCP channel connected");

        Ok(TcpChannel {
            index,
            stream: Some(stream),
        })
    }

    fn kind(&self) -> &'static str {
        "tcp"
    }
}

// =============================================================================
// TcpChannel
// =============================================================================

/// A connected TCP sub-channel.
#[derive(Debug)]
pub struct TcpChannel {
    index: u32,
    stream: Option<TcpStream>,
}

impl TcpChannel {
    /// Stream index served by this channel.
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[async_trait]
impl SubChannel for TcpChannel {
    async fn send(&mut self, packet: Bytes) -> Result<(), TransportError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::Closed(format!("channel {} already closed", self.index)))?;

        // A failed write may have sent part of a packet, after which the byte
        // stream can no longer be parsed by the receiver.
        if let Err(e) = stream.write_all(&packet).await {
            self.stream = None;
            return Err(TransportError::Closed(describe_io_error(&e)));
        }

        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| TransportError::Closed(describe_io_error(&e)))?;
        }
        Ok(())
    }
}

fn describe_io_error(e: &io::Error) -> String {
    format!("{:?}: {}", e.kind(), e)
}
