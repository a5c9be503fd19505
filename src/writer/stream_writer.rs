//! Writer façade.
//!
//! The [`StreamWriter`] owns the descriptor table and the pusher workers of
//! one output endpoint and coordinates their lifecycle:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        StreamWriter                          │
//! │  new():   validate args → DescriptorTable                    │
//! │  start(): spawn control task + one PusherWorker per stream   │
//! │  stop():  close queues → stop control task → join workers    │
//! └───────────────┬──────────────────┬──────────────────┬────────┘
//!                 ▼                  ▼                  ▼
//!          PusherWorker 0     PusherWorker 1     PusherWorker N
//!                 │                  │                  │
//!                 ▼                  ▼                  ▼
//!            sub-channel 0      sub-channel 1      sub-channel N
//! ```
//!
//! Shutdown is cooperative: closing a queue lets its worker drain and exit.
//! There is no forced termination and no timeout.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ConfigError, WriterError};
use crate::protocol::FourCC;
use crate::transport::Transport;

use super::descriptor::{DescriptorTable, OutgoingStream, StreamDescriptor};
use super::pusher::{ExitReason, PusherHandle, PusherWorker, WorkerExit};
use super::stats::{StreamStatsSnapshot, StreamStatus, WorkerState, DEFAULT_STATS_INTERVAL};

/// Process-wide counter used only to give writers distinct log names.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(0);

fn next_instance_number() -> u64 {
    NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Configuration
// =============================================================================

/// Runtime options for a [`StreamWriter`].
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Emit periodic per-stream and per-writer statistics
    pub stats_enabled: bool,

    /// Statistics reporting interval
    pub stats_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            stats_enabled: true,
            stats_interval: DEFAULT_STATS_INTERVAL,
        }
    }
}

impl WriterConfig {
    /// Disable statistics reporting.
    pub fn without_stats(mut self) -> Self {
        self.stats_enabled = false;
        self
    }

    /// Set the statistics reporting interval.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }
}

// =============================================================================
// Stats Handle
// =============================================================================

/// Cloneable read-only view of a writer's streams.
///
/// Lets other tasks (the status endpoint) observe the writer without
/// sharing the writer itself.
#[derive(Clone)]
pub struct StatsHandle {
    writer: Arc<str>,
    streams: Arc<Vec<(StreamDescriptor, Arc<StreamStatus>)>>,
}

impl StatsHandle {
    /// Name of the observed writer.
    pub fn writer_name(&self) -> &str {
        &self.writer
    }

    /// Snapshot every stream, in descriptor order.
    pub fn snapshot(&self) -> Vec<StreamStatsSnapshot> {
        self.streams
            .iter()
            .map(|(descriptor, status)| StreamStatsSnapshot::capture(descriptor, status))
            .collect()
    }

    /// Number of workers currently in the `Running` state.
    pub fn running_workers(&self) -> usize {
        self.streams
            .iter()
            .filter(|(_, status)| status.state() == WorkerState::Running)
            .count()
    }

    /// Frames transmitted across all streams.
    pub fn total_frames(&self) -> u64 {
        self.streams.iter().map(|(_, status)| status.frames()).sum()
    }
}

// =============================================================================
// Stop Report
// =============================================================================

/// Outcome of [`StreamWriter::stop`].
#[derive(Debug, Clone, Default)]
pub struct StopReport {
    /// Queues the producer had left open and the writer closed
    pub unclosed_queues: usize,

    /// One entry per worker, in descriptor order
    pub exits: Vec<WorkerExit>,
}

impl StopReport {
    /// Whether every worker drained its queue normally.
    pub fn all_drained(&self) -> bool {
        self.exits.iter().all(|e| e.reason == ExitReason::Drained)
    }

    /// Frames transmitted across all streams.
    pub fn total_frames(&self) -> u64 {
        self.exits.iter().map(|e| e.frames).sum()
    }
}

// =============================================================================
// StreamWriter
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// Multi-stream writer for one output endpoint.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pc_streamer::queue::{Frame, FrameQueue};
/// use pc_streamer::transport::TcpTransport;
/// use pc_streamer::writer::{OutgoingStream, StreamWriter};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let queue = Arc::new(FrameQueue::new("tile0", 4));
/// let streams = vec![OutgoingStream::new(0, 0, Arc::clone(&queue))];
///
/// let mut writer = StreamWriter::new("tcp://127.0.0.1:9000", "cwi1", streams, TcpTransport::new())?;
/// writer.start()?;
///
/// queue.enqueue(Frame::new(0, vec![0u8; 1024])).await?;
/// queue.close();
///
/// let report = writer.stop().await;
/// assert!(report.all_drained());
/// # Ok(())
/// # }
/// ```
pub struct StreamWriter<T: Transport> {
    name: String,
    url: Url,
    fourcc: FourCC,
    table: DescriptorTable,
    transport: Arc<T>,
    config: WriterConfig,
    statuses: Vec<Arc<StreamStatus>>,
    pushers: Vec<PusherHandle>,
    control: Option<(watch::Sender<bool>, JoinHandle<()>)>,
    lifecycle: Lifecycle,
}

impl<T: Transport> StreamWriter<T> {
    /// Create a writer with the default configuration.
    ///
    /// See [`with_config`](Self::with_config).
    pub fn new(
        url: &str,
        fourcc: &str,
        streams: Vec<OutgoingStream>,
        transport: T,
    ) -> Result<Self, ConfigError> {
        Self::with_config(url, fourcc, streams, transport, WriterConfig::default())
    }

    /// Create a writer.
    ///
    /// # Arguments
    /// * `url` - Destination endpoint; must parse as a URL
    /// * `fourcc` - Media-type tag, exactly 4 characters
    /// * `streams` - (tile, quality, queue) descriptions, at least one
    /// * `transport` - Transport used to open one sub-channel per stream
    /// * `config` - Runtime options
    ///
    /// Nothing is spawned until [`start`](Self::start).
    pub fn with_config(
        url: &str,
        fourcc: &str,
        streams: Vec<OutgoingStream>,
        transport: T,
        config: WriterConfig,
    ) -> Result<Self, ConfigError> {
        let name = format!("StreamWriter#{}", next_instance_number());

        if streams.is_empty() {
            return Err(ConfigError::NoStreams);
        }
        let fourcc = FourCC::parse(fourcc)?;
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let table = DescriptorTable::build(fourcc, &streams)?;
        let statuses = table.iter().map(|_| Arc::new(StreamStatus::new())).collect();

        debug!(
            writer = %name,
            url = %url,
            fourcc = %fourcc,
            streams = table.len(),
            ports_per_quality = table.ports_per_quality(),
            "Writer created"
        );

        Ok(Self {
            name,
            url,
            fourcc,
            table,
            transport: Arc::new(transport),
            config,
            statuses,
            pushers: Vec::new(),
            control: None,
            lifecycle: Lifecycle::Created,
        })
    }

    /// Spawn the control task and one pusher worker per stream.
    ///
    /// Must be called from within a tokio runtime, at most once.
    pub fn start(&mut self) -> Result<(), WriterError> {
        match self.lifecycle {
            Lifecycle::Running => return Err(WriterError::AlreadyStarted),
            Lifecycle::Stopped => return Err(WriterError::Stopped),
            Lifecycle::Created => {}
        }

        let stats_interval = self
            .config
            .stats_enabled
            .then_some(self.config.stats_interval);

        for (descriptor, status) in self.table.iter().zip(&self.statuses) {
            let worker = PusherWorker::new(
                format!("{}.{}", self.name, descriptor.index),
                descriptor.clone(),
                Arc::clone(&self.transport),
                self.url.clone(),
                stats_interval,
            )
            .with_status(Arc::clone(status));

            debug!(
                writer = %self.name,
                pusher = %worker.name(),
                index = descriptor.index,
                "Spawning pusher"
            );
            self.pushers.push(worker.spawn());
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let control = tokio::spawn(control_loop(
            self.stats_handle(),
            stats_interval,
            shutdown_rx,
        ));
        self.control = Some((shutdown_tx, control));

        self.lifecycle = Lifecycle::Running;
        info!(
            writer = %self.name,
            url = %self.url,
            streams = self.pushers.len(),
            transport = self.transport.kind(),
            "Writer started"
        );

        Ok(())
    }

    /// Stop the writer and wait for every worker to exit.
    ///
    /// Queues that the producer left open are closed here, with a warning.
    /// Then the control task is stopped and each worker is joined in turn.
    /// Workers send what is still queued before exiting; a transport that
    /// never completes a send stalls this call.
    ///
    /// Calling `stop` again, or on a writer that never started, only closes
    /// any queues still open.
    pub async fn stop(&mut self) -> StopReport {
        let mut report = StopReport::default();

        for descriptor in &self.table {
            if descriptor.queue.close() {
                warn!(
                    writer = %self.name,
                    index = descriptor.index,
                    queue = %descriptor.queue.name(),
                    "Input queue not closed by producer. Closing."
                );
                report.unclosed_queues += 1;
            }
        }

        if let Some((shutdown, control)) = self.control.take() {
            let _ = shutdown.send(true);
            if let Err(e) = control.await {
                error!(writer = %self.name, error = %e, "Control task failed");
            }
        }

        for pusher in self.pushers.drain(..) {
            pusher.stop();
            report.exits.push(pusher.join().await);
        }

        if self.lifecycle == Lifecycle::Running {
            info!(
                writer = %self.name,
                frames = report.total_frames(),
                "Writer stopped"
            );
        }
        self.lifecycle = Lifecycle::Stopped;

        report
    }

    /// Diagnostic name (`StreamWriter#<n>`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Destination endpoint.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Media-type code shared by all streams.
    pub fn fourcc(&self) -> FourCC {
        self.fourcc
    }

    /// The descriptor table.
    pub fn descriptors(&self) -> &DescriptorTable {
        &self.table
    }

    /// The injected transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether `start` succeeded and `stop` has not been called yet.
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Running
    }

    /// A cloneable view of per-stream statistics.
    pub fn stats_handle(&self) -> StatsHandle {
        let streams = self
            .table
            .iter()
            .cloned()
            .zip(self.statuses.iter().cloned())
            .collect();

        StatsHandle {
            writer: Arc::from(self.name.as_str()),
            streams: Arc::new(streams),
        }
    }

    /// Snapshot of every stream, in descriptor order.
    pub fn stream_stats(&self) -> Vec<StreamStatsSnapshot> {
        self.table
            .iter()
            .zip(&self.statuses)
            .map(|(descriptor, status)| StreamStatsSnapshot::capture(descriptor, status))
            .collect()
    }
}

impl<T: Transport> std::fmt::Debug for StreamWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("name", &self.name)
            .field("url", &self.url.as_str())
            .field("fourcc", &self.fourcc)
            .field("streams", &self.table.len())
            .field("transport", &self.transport.kind())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

impl<T: Transport> Drop for StreamWriter<T> {
    fn drop(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }

        // Workers cannot be joined here; closing the queues lets them drain
        // and exit on their own.
        warn!(writer = %self.name, "Writer dropped without stop(); closing input queues");
        for descriptor in &self.table {
            descriptor.queue.close();
        }
        if let Some((shutdown, _)) = self.control.take() {
            let _ = shutdown.send(true);
        }
    }
}

/// Writer-level supervision loop.
///
/// Reports how many workers are still running at each interval and exits
/// when the shutdown flag flips (or its sender is dropped).
async fn control_loop(
    stats: StatsHandle,
    interval: Option<Duration>,
    mut shutdown: watch::Receiver<bool>,
) {
    let Some(interval) = interval.filter(|i| !i.is_zero()) else {
        let _ = shutdown.wait_for(|stop| *stop).await;
        return;
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let streams = stats.streams.len();
                let running = stats.running_workers();
                info!(
                    writer = %stats.writer_name(),
                    running,
                    streams,
                    frames = stats.total_frames(),
                    "Writer statistics"
                );
                if running < streams {
                    debug!(
                        writer = %stats.writer_name(),
                        stopped = streams - running,
                        "Some streams are no longer running"
                    );
                }
            }
        }
    }
}
