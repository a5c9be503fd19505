//! Per-stream pusher worker.
//!
//! One worker runs per stream descriptor. It drains the stream's queue,
//! frames each payload with the fixed header and hands the packet to its own
//! transport sub-channel.
//!
//! ```text
//!   Created ──spawn──► Running ──queue closed / fatal error──► Stopping ──► Stopped
//!                         │                                       │
//!                   dequeue → frame → send                  close channel
//! ```
//!
//! Faults stay inside the worker: a failing transport ends this stream only,
//! sibling streams keep running.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::protocol::build_packet;
use crate::queue::FrameQueue;
use crate::transport::{SubChannel, Transport};

use super::descriptor::StreamDescriptor;
use super::stats::{IntervalStats, StreamStatus, WorkerState};

// =============================================================================
// Worker Exit
// =============================================================================

/// Why a worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The queue was closed and every frame in it was sent
    Drained,
    /// The sub-channel became unusable
    TransportFailed,
    /// The sub-channel could not be opened
    OpenFailed,
    /// The worker task panicked
    Panicked,
}

/// Summary returned when a worker finishes.
#[derive(Debug, Clone)]
pub struct WorkerExit {
    /// Worker name (`<writer>.<index>`)
    pub name: String,
    /// Stream index
    pub index: u32,
    /// Why the loop ended
    pub reason: ExitReason,
    /// Frames transmitted
    pub frames: u64,
    /// Payload bytes transmitted
    pub bytes: u64,
    /// Failed sends
    pub send_errors: u64,
}

impl WorkerExit {
    fn new(name: &str, index: u32, reason: ExitReason, status: &StreamStatus) -> Self {
        Self {
            name: name.to_string(),
            index,
            reason,
            frames: status.frames(),
            bytes: status.bytes(),
            send_errors: status.send_errors(),
        }
    }
}

// =============================================================================
// PusherWorker
// =============================================================================

/// Worker that pumps one stream onto the transport.
pub struct PusherWorker<T: Transport> {
    name: String,
    descriptor: StreamDescriptor,
    transport: Arc<T>,
    endpoint: Url,
    status: Arc<StreamStatus>,
    stats_interval: Option<Duration>,
}

impl<T: Transport> PusherWorker<T> {
    /// Create a worker for `descriptor`.
    ///
    /// `stats_interval` enables periodic statistics reports when set.
    pub fn new(
        name: impl Into<String>,
        descriptor: StreamDescriptor,
        transport: Arc<T>,
        endpoint: Url,
        stats_interval: Option<Duration>,
    ) -> Self {
        Self {
            name: name.into(),
            descriptor,
            transport,
            endpoint,
            status: Arc::new(StreamStatus::new()),
            stats_interval,
        }
    }

    /// Report into an existing status instead of a fresh one.
    pub fn with_status(mut self, status: Arc<StreamStatus>) -> Self {
        self.status = status;
        self
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared status of this worker.
    pub fn status(&self) -> Arc<StreamStatus> {
        Arc::clone(&self.status)
    }

    /// Start the worker on the current tokio runtime.
    pub fn spawn(self) -> PusherHandle {
        let name = self.name.clone();
        let index = self.descriptor.index;
        let queue = Arc::clone(&self.descriptor.queue);
        let status = Arc::clone(&self.status);

        let task = tokio::spawn(self.run());
        PusherHandle {
            name,
            index,
            queue,
            status,
            task: Some(task),
        }
    }

    /// Run the pump loop to completion.
    pub async fn run(self) -> WorkerExit {
        let index = self.descriptor.index;
        let queue = &self.descriptor.queue;
        self.status.set_state(WorkerState::Running);

        info!(
            stream = %self.name,
            index,
            tile = self.descriptor.tile,
            quality = self.descriptor.quality,
            transport = self.transport.kind(),
            "Pusher started"
        );

        let mut channel = match self.transport.open_channel(&self.endpoint, index).await {
            Ok(channel) => channel,
            Err(e) => {
                error!(stream = %self.name, error = %e, "Failed to open stream channel");
                self.abandon_queue(queue);
                self.status.set_state(WorkerState::Stopped);
                return WorkerExit::new(&self.name, index, ExitReason::OpenFailed, &self.status);
            }
        };

        let mut interval = self.stats_interval.map(IntervalStats::new);

        let reason = loop {
            let Some(frame) = queue.dequeue().await else {
                break ExitReason::Drained;
            };

            let packet = match build_packet(self.descriptor.fourcc, &frame) {
                Ok(packet) => packet,
                Err(e) => {
                    // Producer handed us something that cannot be framed; the
                    // channel itself is fine.
                    error!(stream = %self.name, error = %e, "Dropping unframeable frame");
                    self.status.record_send_error();
                    continue;
                }
            };

            match channel.send(packet).await {
                Ok(()) => {
                    self.status.record_sent(frame.len());
                    if let Some(report) = interval.as_mut().and_then(|s| s.update(frame.len())) {
                        info!(
                            stream = %self.name,
                            fps = (report.fps * 100.0).round() / 100.0,
                            bytes_per_packet = report.bytes_per_packet,
                            aggregate_packets = report.aggregate_packets,
                            "Stream statistics"
                        );
                    }
                }
                Err(e) if e.is_fatal() => {
                    self.status.record_send_error();
                    error!(stream = %self.name, error = %e, "Transport failed, stopping stream");
                    break ExitReason::TransportFailed;
                }
                Err(e) => {
                    self.status.record_send_error();
                    warn!(
                        stream = %self.name,
                        error = %e,
                        timestamp = frame.timestamp,
                        "Failed to send frame"
                    );
                }
            }
        };

        self.status.set_state(WorkerState::Stopping);

        if reason == ExitReason::TransportFailed {
            self.abandon_queue(queue);
        }

        if let Err(e) = channel.close().await {
            warn!(stream = %self.name, error = %e, "Error closing stream channel");
        }

        let exit = WorkerExit::new(&self.name, index, reason, &self.status);
        info!(
            stream = %self.name,
            reason = ?exit.reason,
            frames = exit.frames,
            bytes = exit.bytes,
            send_errors = exit.send_errors,
            "Pusher stopped"
        );

        self.status.set_state(WorkerState::Stopped);
        exit
    }

    /// Close the input queue after this stream gave up, so the producer
    /// stops feeding it.
    fn abandon_queue(&self, queue: &FrameQueue) {
        if queue.close() {
            let pending = queue.len();
            warn!(
                stream = %self.name,
                pending,
                "Closed input queue; pending frames will not be sent"
            );
        }
    }
}

// =============================================================================
// PusherHandle
// =============================================================================

/// Handle to a running pusher worker.
pub struct PusherHandle {
    name: String,
    index: u32,
    queue: Arc<FrameQueue>,
    status: Arc<StreamStatus>,
    task: Option<JoinHandle<WorkerExit>>,
}

impl PusherHandle {
    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stream index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Shared status of the worker.
    pub fn status(&self) -> &Arc<StreamStatus> {
        &self.status
    }

    /// Ask the worker to stop.
    ///
    /// Closes the input queue; the worker sends what is still queued and
    /// then exits.
    pub fn stop(&self) {
        if self.queue.close() {
            debug!(stream = %self.name, "Stop requested, input queue closed");
        }
    }

    /// Whether the worker task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    /// Wait for the worker to exit.
    ///
    /// There is no timeout: a transport that never completes a send stalls
    /// this call.
    pub async fn join(mut self) -> WorkerExit {
        let Some(task) = self.task.take() else {
            return WorkerExit::new(&self.name, self.index, ExitReason::Drained, &self.status);
        };

        match task.await {
            Ok(exit) => exit,
            Err(e) => {
                error!(stream = %self.name, error = %e, "Pusher task failed");
                self.queue.close();
                self.status.set_state(WorkerState::Stopped);
                WorkerExit::new(&self.name, self.index, ExitReason::Panicked, &self.status)
            }
        }
    }
}
