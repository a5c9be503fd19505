//! Per-stream statistics.
//!
//! Two views are kept:
//! - [`StreamStatus`]: lifetime counters and worker state, shared through an
//!   `Arc` so the writer and the status endpoint can read them while the
//!   worker runs.
//! - [`IntervalStats`]: owned by the worker, aggregated over a reporting
//!   interval and reset after each report.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::descriptor::StreamDescriptor;

/// Default reporting interval for per-stream statistics.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// Worker State
// =============================================================================

/// Lifecycle of a pusher worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Worker exists, task not yet running
    Created,
    /// Pumping frames
    Running,
    /// Loop ended, releasing the sub-channel
    Stopping,
    /// Task finished
    Stopped,
}

impl WorkerState {
    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Created => 0,
            WorkerState::Running => 1,
            WorkerState::Stopping => 2,
            WorkerState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Running,
            2 => WorkerState::Stopping,
            _ => WorkerState::Stopped,
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

// =============================================================================
// StreamStatus
// =============================================================================

/// Lifetime counters and state of one stream, shared with observers.
#[derive(Debug)]
pub struct StreamStatus {
    state: AtomicU8,
    frames: AtomicU64,
    bytes: AtomicU64,
    send_errors: AtomicU64,
}

impl StreamStatus {
    /// Create counters for a freshly created worker.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Created.as_u8()),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            send_errors: AtomicU64::new(0),
        }
    }

    /// Current worker state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    pub(crate) fn record_sent(&self, bytes: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Frames transmitted so far.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Payload bytes transmitted so far (headers excluded).
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Failed sends so far.
    pub fn send_errors(&self) -> u64 {
        self.send_errors.load(Ordering::Relaxed)
    }
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of one stream, serialized by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatsSnapshot {
    /// Channel index
    pub index: u32,
    /// Tile number
    pub tile: u32,
    /// Quality level
    pub quality: u32,
    /// Worker lifecycle state
    pub state: WorkerState,
    /// Frames transmitted
    pub frames: u64,
    /// Payload bytes transmitted
    pub bytes: u64,
    /// Failed sends
    pub send_errors: u64,
    /// Frames waiting in the input queue
    pub queue_len: usize,
    /// Whether the input queue is closed
    pub queue_closed: bool,
    /// Frames evicted from a full input queue
    pub dropped: u64,
}

impl StreamStatsSnapshot {
    /// Capture the current state of a stream.
    pub fn capture(descriptor: &StreamDescriptor, status: &StreamStatus) -> Self {
        Self {
            index: descriptor.index,
            tile: descriptor.tile,
            quality: descriptor.quality,
            state: status.state(),
            frames: status.frames(),
            bytes: status.bytes(),
            send_errors: status.send_errors(),
            queue_len: descriptor.queue.len(),
            queue_closed: descriptor.queue.is_closed(),
            dropped: descriptor.queue.dropped(),
        }
    }
}

// =============================================================================
// IntervalStats
// =============================================================================

/// Aggregate figures for one reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalReport {
    /// Packets per second over the interval
    pub fps: f64,
    /// Mean payload size over the interval
    pub bytes_per_packet: u64,
    /// Packets since the worker started
    pub aggregate_packets: u64,
}

/// Interval aggregation owned by a single worker.
#[derive(Debug)]
pub struct IntervalStats {
    interval: Duration,
    started: Instant,
    total_bytes: u64,
    total_packets: u64,
    aggregate_packets: u64,
}

impl IntervalStats {
    /// Start aggregating now.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(interval, Instant::now())
    }

    /// Start aggregating at `start`.
    pub fn starting_at(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            started: start,
            total_bytes: 0,
            total_packets: 0,
            aggregate_packets: 0,
        }
    }

    /// Account one packet of `n_bytes` payload.
    ///
    /// Returns a report when the interval has elapsed, after which the
    /// interval counters are reset. The aggregate count keeps running.
    pub fn update(&mut self, n_bytes: usize) -> Option<IntervalReport> {
        self.update_at(n_bytes, Instant::now())
    }

    /// [`update`](Self::update) with an explicit clock.
    pub fn update_at(&mut self, n_bytes: usize, now: Instant) -> Option<IntervalReport> {
        self.total_bytes += n_bytes as u64;
        self.total_packets += 1;
        self.aggregate_packets += 1;

        let elapsed = now.saturating_duration_since(self.started);
        if elapsed < self.interval {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let report = IntervalReport {
            fps: if secs > 0.0 {
                self.total_packets as f64 / secs
            } else {
                0.0
            },
            bytes_per_packet: self.total_bytes / self.total_packets.max(1),
            aggregate_packets: self.aggregate_packets,
        };

        self.started = now;
        self.total_bytes = 0;
        self.total_packets = 0;

        Some(report)
    }
}
