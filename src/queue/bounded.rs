use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::QueueError;

use super::frame::Frame;

/// Default queue capacity in frames.
///
/// Point-cloud frames are large; a couple of frames of slack is enough to
/// absorb encoder jitter without adding latency.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

// =============================================================================
// Overflow Policy
// =============================================================================

/// What `enqueue` does when the queue is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for the consumer to make room
    #[default]
    Block,

    /// Evict the oldest queued frame to make room for the new one
    DropOldest,
}

// =============================================================================
// FrameQueue
// =============================================================================

struct QueueState {
    frames: VecDeque<Frame>,
    closed: bool,
}

/// Thread-safe, closable, bounded FIFO of frames.
///
/// Each queue has exactly one producer-side owner and exactly one consumer
/// (its pusher worker). Closing is a terminal state that wakes every waiter
/// at once; a consumer blocked in [`dequeue`](Self::dequeue) does not need
/// another enqueue to notice it.
///
/// Frames still queued at close time are drained in order before `dequeue`
/// reports the end of the stream.
pub struct FrameQueue {
    name: String,
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<QueueState>,
    /// Signalled when a frame is pushed or the queue closes
    readable: Notify,
    /// Signalled when a frame is popped or the queue closes
    writable: Notify,
    dropped: AtomicU64,
}

impl FrameQueue {
    /// Create a queue that blocks producers when full.
    ///
    /// A capacity of zero is bumped to one.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self::with_policy(name, capacity, OverflowPolicy::Block)
    }

    /// Create a queue with an explicit overflow policy.
    pub fn with_policy(name: impl Into<String>, capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            capacity,
            policy,
            state: Mutex::new(QueueState {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            readable: Notify::new(),
            writable: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Critical sections never panic mid-update, so a poisoned lock still
        // holds a consistent deque.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame, waiting for room if the policy is `Block`.
    ///
    /// Returns [`QueueError::Closed`] once the queue has been closed, even if
    /// the call was waiting for room at the time.
    pub async fn enqueue(&self, frame: Frame) -> Result<(), QueueError> {
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(QueueError::Closed);
                }
                if state.frames.len() < self.capacity {
                    state.frames.push_back(frame);
                    drop(state);
                    self.readable.notify_waiters();
                    return Ok(());
                }
                if self.policy == OverflowPolicy::DropOldest {
                    state.frames.pop_front();
                    state.frames.push_back(frame);
                    drop(state);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    self.readable.notify_waiters();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Append a frame without waiting.
    ///
    /// With the `Block` policy a full queue yields [`QueueError::Full`];
    /// with `DropOldest` the head is evicted instead.
    pub fn try_enqueue(&self, frame: Frame) -> Result<(), QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if state.frames.len() >= self.capacity {
            match self.policy {
                OverflowPolicy::Block => return Err(QueueError::Full),
                OverflowPolicy::DropOldest => {
                    state.frames.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        state.frames.push_back(frame);
        drop(state);
        self.readable.notify_waiters();
        Ok(())
    }

    /// Take the next frame, waiting until one is available.
    ///
    /// Returns `None` only when the queue is closed and fully drained.
    pub async fn dequeue(&self) -> Option<Frame> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(frame) = state.frames.pop_front() {
                    drop(state);
                    self.writable.notify_waiters();
                    return Some(frame);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Close the queue.
    ///
    /// Returns `true` if this call closed it and `false` if it was already
    /// closed. All blocked producers and consumers are woken.
    pub fn close(&self) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
        true
    }

    /// Whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// Whether no frames are queued.
    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// Maximum number of queued frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy of this queue.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Frames evicted by the `DropOldest` policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FrameQueue")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("len", &state.frames.len())
            .field("closed", &state.closed)
            .finish()
    }
}
