use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{ProtocolError, ReceiverError};
use crate::protocol::{FrameHeader, PacketDecoder, DEFAULT_MAX_PAYLOAD};

/// Default capacity of the packet channel returned by [`TcpReceiver::spawn`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// Pause after a failed `accept()` before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// One packet reassembled from a stream's byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedPacket {
    /// Stream index (port offset) the packet arrived on
    pub index: u32,
    /// Decoded header
    pub header: FrameHeader,
    /// Payload bytes
    pub payload: Bytes,
}

/// Listener set for a range of stream indices.
pub struct TcpReceiver {
    listeners: Vec<(u32, TcpListener)>,
    max_payload: usize,
}

impl TcpReceiver {
    /// Bind `host:(base_port + index)` for every index.
    pub async fn bind(
        host: &str,
        base_port: u16,
        indices: impl IntoIterator<Item = u32>,
    ) -> Result<Self, ReceiverError> {
        let mut listeners = Vec::new();

        for index in indices {
            let port = u16::try_from(index)
                .ok()
                .and_then(|offset| base_port.checked_add(offset))
                .ok_or(ReceiverError::PortOverflow { base_port, index })?;

            let addr = format_addr(host, port);
            let listener = match TcpListener::bind(&addr).await {
                Ok(listener) => listener,
                Err(source) => return Err(ReceiverError::Bind { addr, source }),
            };

            debug!(index, port, "Receiver listening");
            listeners.push((index, listener));
        }

        if listeners.is_empty() {
            return Err(ReceiverError::NoStreams);
        }

        Ok(Self {
            listeners,
            max_payload: DEFAULT_MAX_PAYLOAD,
        })
    }

    /// Reject packets whose declared payload exceeds `max_payload`.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Bound addresses per stream index.
    pub fn local_addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.listeners
            .iter()
            .filter_map(|(index, listener)| listener.local_addr().ok().map(|addr| (*index, addr)))
            .collect()
    }

    /// Start one accept task per port.
    ///
    /// Packets from all streams are delivered on the returned channel. Each
    /// port serves one sender at a time; when a sender disconnects the port
    /// accepts the next one. Tasks end when the channel receiver is dropped
    /// or the handle is shut down.
    pub fn spawn(self, capacity: usize) -> (ReceiverHandle, mpsc::Receiver<ReceivedPacket>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let addrs = self.local_addrs();
        let max_payload = self.max_payload;

        let tasks = self
            .listeners
            .into_iter()
            .map(|(index, listener)| {
                tokio::spawn(accept_loop(index, listener, tx.clone(), max_payload))
            })
            .collect();

        info!(streams = addrs.len(), "Receiver started");
        (ReceiverHandle { tasks, addrs }, rx)
    }
}

/// Handle to the accept tasks of a spawned [`TcpReceiver`].
pub struct ReceiverHandle {
    tasks: Vec<JoinHandle<()>>,
    addrs: Vec<(u32, SocketAddr)>,
}

impl ReceiverHandle {
    /// Bound addresses per stream index.
    pub fn local_addrs(&self) -> &[(u32, SocketAddr)] {
        &self.addrs
    }

    /// Stop accepting and drop open connections.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn accept_loop(
    index: u32,
    listener: TcpListener,
    tx: mpsc::Sender<ReceivedPacket>,
    max_payload: usize,
) {
    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(index, error = %e, "Failed to accept connection");
                    if pause_after_accept_error(&tx).await {
                        continue;
                    }
                    return;
                }
            },
            _ = tx.closed() => return,
        };

        info!(index, peer = %peer, "Sender connected");

        match read_packets(index, socket, &tx, max_payload).await {
            Ok(Some(packets)) => info!(index, packets, "Sender disconnected"),
            Ok(None) => return,
            Err(e) => warn!(index, error = %e, "Dropping sender after protocol error"),
        }
    }
}

/// Wait out [`ACCEPT_RETRY_DELAY`] so persistent errors such as running out
/// of file descriptors do not spin the loop.
///
/// Returns `false` if nobody is listening for packets any more.
async fn pause_after_accept_error(tx: &mpsc::Sender<ReceivedPacket>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => true,
        _ = tx.closed() => false,
    }
}

/// Read packets until the sender disconnects.
///
/// Returns the number of packets forwarded, or `None` once nobody is
/// listening for packets any more.
async fn read_packets(
    index: u32,
    mut socket: TcpStream,
    tx: &mpsc::Sender<ReceivedPacket>,
    max_payload: usize,
) -> Result<Option<u64>, ProtocolError> {
    let mut decoder = PacketDecoder::with_max_payload(max_payload);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut forwarded = 0u64;

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(index, error = %e, "Read failed");
                break;
            }
        };
        decoder.push(&chunk[..n]);

        while let Some((header, payload)) = decoder.next_packet()? {
            let packet = ReceivedPacket {
                index,
                header,
                payload,
            };
            if tx.send(packet).await.is_err() {
                return Ok(None);
            }
            forwarded += 1;
        }
    }

    if decoder.buffered() > 0 {
        warn!(
            index,
            bytes = decoder.buffered(),
            "Sender disconnected mid-packet"
        );
    }

    Ok(Some(forwarded))
}

fn format_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
