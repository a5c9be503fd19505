//! In-process transport.
//!
//! Records every packet per stream index instead of sending it anywhere.
//! Used for dry runs of the sender and throughout the tests, where it also
//! provides fault injection (transient send failures, broken channels and
//! refused opens).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Notify;
use url::Url;

use crate::error::TransportError;
use crate::protocol::{split_packet, FrameHeader};

use super::{SubChannel, Transport};

#[derive(Debug, Default)]
struct ChannelRecord {
    packets: Vec<Bytes>,
    open: bool,
    open_count: u32,
    fail_next: usize,
    broken: bool,
    refuse_open: bool,
    send_errors: u64,
}

#[derive(Default)]
struct MemoryInner {
    channels: Mutex<HashMap<u32, ChannelRecord>>,
    endpoint: Mutex<Option<Url>>,
    delivered: Notify,
}

impl MemoryInner {
    fn channels(&self) -> MutexGuard<'_, HashMap<u32, ChannelRecord>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// MemoryTransport
// =============================================================================

/// Transport that keeps packets in memory.
///
/// Clones share the same recorded state, so a test can keep a handle while
/// the writer owns another.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<MemoryInner>,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Packets recorded on `index`, in send order.
    pub fn packets(&self, index: u32) -> Vec<Bytes> {
        self.inner
            .channels()
            .get(&index)
            .map(|record| record.packets.clone())
            .unwrap_or_default()
    }

    /// Decoded headers and payloads recorded on `index`, in send order.
    pub fn frames(&self, index: u32) -> Vec<(FrameHeader, Bytes)> {
        self.packets(index)
            .iter()
            .filter_map(|packet| split_packet(packet).ok())
            .collect()
    }

    /// Number of packets recorded on `index`.
    pub fn packet_count(&self, index: u32) -> usize {
        self.inner
            .channels()
            .get(&index)
            .map(|record| record.packets.len())
            .unwrap_or(0)
    }

    /// Total packets recorded across all channels.
    pub fn total_packets(&self) -> usize {
        self.inner
            .channels()
            .values()
            .map(|record| record.packets.len())
            .sum()
    }

    /// Failed sends observed on `index`.
    pub fn send_errors(&self, index: u32) -> u64 {
        self.inner
            .channels()
            .get(&index)
            .map(|record| record.send_errors)
            .unwrap_or(0)
    }

    /// Whether a channel for `index` is currently open.
    pub fn is_open(&self, index: u32) -> bool {
        self.inner
            .channels()
            .get(&index)
            .map(|record| record.open)
            .unwrap_or(false)
    }

    /// Indices of channels that were opened at least once, ascending.
    pub fn opened_channels(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = self
            .inner
            .channels()
            .iter()
            .filter(|(_, record)| record.open_count > 0)
            .map(|(index, _)| *index)
            .collect();
        indices.sort_unstable();
        indices
    }

    /// Number of channels currently open.
    pub fn open_channel_count(&self) -> usize {
        self.inner
            .channels()
            .values()
            .filter(|record| record.open)
            .count()
    }

    /// Endpoint passed to the most recent `open_channel`.
    pub fn endpoint(&self) -> Option<Url> {
        self.inner
            .endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make the next `count` sends on `index` fail with a recoverable error.
    pub fn fail_next_sends(&self, index: u32, count: usize) {
        self.inner.channels().entry(index).or_default().fail_next = count;
    }

    /// Make every further send on `index` fail with a fatal error.
    pub fn break_channel(&self, index: u32) {
        self.inner.channels().entry(index).or_default().broken = true;
    }

    /// Make `open_channel` fail for `index`.
    pub fn refuse_open(&self, index: u32) {
        self.inner.channels().entry(index).or_default().refuse_open = true;
    }

    /// Wait until at least `count` packets were recorded on `index`.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub async fn wait_for_packets(&self, index: u32, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.delivered.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.packet_count(index) >= count {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("opened_channels", &self.opened_channels())
            .field("total_packets", &self.total_packets())
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Channel = MemoryChannel;

    async fn open_channel(
        &self,
        endpoint: &Url,
        index: u32,
    ) -> Result<Self::Channel, TransportError> {
        *self
            .inner
            .endpoint
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(endpoint.clone());

        let mut channels = self.inner.channels();
        let record = channels.entry(index).or_default();
        if record.refuse_open {
            return Err(TransportError::Connect {
                index,
                reason: "refused by memory transport".to_string(),
            });
        }
        record.open = true;
        record.open_count += 1;

        Ok(MemoryChannel {
            index,
            inner: Arc::clone(&self.inner),
            closed: false,
        })
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// MemoryChannel
// =============================================================================

/// Sub-channel of a [`MemoryTransport`].
pub struct MemoryChannel {
    index: u32,
    inner: Arc<MemoryInner>,
    closed: bool,
}

impl MemoryChannel {
    /// Stream index served by this channel.
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[async_trait]
impl SubChannel for MemoryChannel {
    async fn send(&mut self, packet: Bytes) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed(format!(
                "channel {} already closed",
                self.index
            )));
        }

        {
            let mut channels = self.inner.channels();
            let record = channels.entry(self.index).or_default();

            if record.broken {
                record.send_errors += 1;
                return Err(TransportError::Closed(format!(
                    "channel {} is broken",
                    self.index
                )));
            }
            if record.fail_next > 0 {
                record.fail_next -= 1;
                record.send_errors += 1;
                return Err(TransportError::Send(format!(
                    "injected failure on channel {}",
                    self.index
                )));
            }

            record.packets.push(packet);
        }

        self.inner.delivered.notify_waiters();
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.closed = true;
            if let Some(record) = self.inner.channels().get_mut(&self.index) {
                record.open = false;
            }
        }
        Ok(())
    }
}
