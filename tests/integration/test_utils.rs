//! Test utilities for integration tests.
//!
//! Helpers for building writers over the in-memory transport, waiting on
//! asynchronous conditions and finding free port ranges for TCP tests.

use std::sync::Arc;
use std::time::Duration;

use pc_streamer::queue::FrameQueue;
use pc_streamer::receiver::TcpReceiver;
use pc_streamer::transport::MemoryTransport;
use pc_streamer::writer::{OutgoingStream, StreamWriter, WorkerState, WriterConfig};

/// The 2 tiles x 2 qualities layout used throughout the tests.
pub const TWO_BY_TWO: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

// =============================================================================
// Stream Builders
// =============================================================================

/// Create one queue per (tile, quality) pair and the matching stream list.
pub fn make_streams(
    pairs: &[(u32, u32)],
    capacity: usize,
) -> (Vec<OutgoingStream>, Vec<Arc<FrameQueue>>) {
    let queues: Vec<Arc<FrameQueue>> = pairs
        .iter()
        .map(|(tile, quality)| {
            Arc::new(FrameQueue::new(
                format!("tile{}.q{}", tile, quality),
                capacity,
            ))
        })
        .collect();

    let streams = pairs
        .iter()
        .zip(&queues)
        .map(|(&(tile, quality), queue)| OutgoingStream::new(tile, quality, Arc::clone(queue)))
        .collect();

    (streams, queues)
}

/// A writer over a fresh in-memory transport, statistics disabled.
pub struct MemoryFixture {
    pub writer: StreamWriter<MemoryTransport>,
    pub transport: MemoryTransport,
    pub queues: Vec<Arc<FrameQueue>>,
}

impl MemoryFixture {
    pub fn new(pairs: &[(u32, u32)], capacity: usize) -> Self {
        let (streams, queues) = make_streams(pairs, capacity);
        let transport = MemoryTransport::new();
        let writer = StreamWriter::with_config(
            "memory://integration",
            "cwi1",
            streams,
            transport.clone(),
            WriterConfig::default().without_stats(),
        )
        .expect("valid writer arguments");

        Self {
            writer,
            transport,
            queues,
        }
    }

    /// Close every input queue (cooperative end of stream).
    pub fn close_all(&self) {
        for queue in &self.queues {
            queue.close();
        }
    }

    /// State of the worker serving `index`.
    pub fn state(&self, index: u32) -> WorkerState {
        self.writer
            .stream_stats()
            .into_iter()
            .find(|s| s.index == index)
            .map(|s| s.state)
            .expect("stream index exists")
    }
}

// =============================================================================
// Waiting
// =============================================================================

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// =============================================================================
// TCP
// =============================================================================

/// Bind a receiver on `streams` consecutive free ports.
///
/// Returns the receiver and its base port. Probes an ephemeral port and
/// retries when one of the following ports is taken.
pub async fn bind_receiver(streams: u32) -> (TcpReceiver, u16) {
    for _ in 0..50 {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe");
        let base = probe.local_addr().expect("probe address").port();
        drop(probe);

        if let Ok(receiver) = TcpReceiver::bind("127.0.0.1", base, 0..streams).await {
            return (receiver, base);
        }
    }
    panic!("no free range of {} consecutive ports", streams);
}
