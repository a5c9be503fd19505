use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{BufMut, BytesMut};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::protocol::MAX_PAYLOAD_SIZE;
use crate::queue::{Frame, FrameQueue};

/// Default frame rate of a synthetic source.
pub const DEFAULT_FPS: u32 = 15;

/// Default number of points in a quality-0 frame.
pub const DEFAULT_POINTS_PER_FRAME: usize = 1000;

/// Size of one encoded point: x, y, z as f32, r, g, b as u8, then the tile.
pub const POINT_RECORD_SIZE: usize = 16;

/// Most points a single frame can carry and still be framed.
pub const MAX_POINTS_PER_FRAME: usize = MAX_PAYLOAD_SIZE / POINT_RECORD_SIZE;

/// Totals reported when a source finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSummary {
    /// Frames accepted by the queue
    pub frames: u64,
    /// Payload bytes accepted by the queue
    pub bytes: u64,
}

/// Deterministic producer for one (tile, quality) stream.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    tile: u32,
    quality: u32,
    queue: Arc<FrameQueue>,
    fps: u32,
    points_per_frame: usize,
    frame_limit: Option<u64>,
}

impl SyntheticSource {
    /// Create a source feeding `queue`.
    pub fn new(tile: u32, quality: u32, queue: Arc<FrameQueue>) -> Self {
        Self {
            tile,
            quality,
            queue,
            fps: DEFAULT_FPS,
            points_per_frame: DEFAULT_POINTS_PER_FRAME,
            frame_limit: None,
        }
    }

    /// Set the frame rate. Zero produces frames as fast as the queue accepts them.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Set the number of points in a quality-0 frame.
    pub fn with_points_per_frame(mut self, points: usize) -> Self {
        self.points_per_frame = points;
        self
    }

    /// Stop after `frames` frames and close the queue.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Points in every frame of this source.
    ///
    /// Each quality level above 0 adds another `points_per_frame` points.
    /// The result is capped at [`MAX_POINTS_PER_FRAME`].
    pub fn point_count(&self) -> usize {
        self.points_per_frame
            .saturating_mul(self.quality as usize + 1)
            .min(MAX_POINTS_PER_FRAME)
    }

    /// Encode frame number `sequence` with the given timestamp.
    ///
    /// The payload depends only on the tile, quality and sequence number.
    pub fn generate_frame(&self, sequence: u64, timestamp: i64) -> Frame {
        let count = self.point_count();
        let size = count
            .checked_mul(POINT_RECORD_SIZE)
            .unwrap_or(MAX_PAYLOAD_SIZE);
        let mut buf = BytesMut::with_capacity(size);
        let mut rng = XorShift::new(
            (u64::from(self.tile) << 48) ^ (u64::from(self.quality) << 32) ^ sequence,
        );

        // Points orbit slowly around the tile's own column on the x axis
        let phase = sequence as f32 * 0.05;
        let offset = self.tile as f32;
        for _ in 0..count {
            let x = offset + rng.next_unit() + phase.sin() * 0.1;
            let y = rng.next_unit() * 2.0;
            let z = rng.next_unit() + phase.cos() * 0.1;
            let rgb = rng.next_u64().to_le_bytes();

            buf.put_f32_le(x);
            buf.put_f32_le(y);
            buf.put_f32_le(z);
            buf.put_slice(&rgb[..3]);
            buf.put_u8(self.tile as u8);
        }

        Frame::new(timestamp, buf.freeze())
    }

    /// Produce frames until the frame limit is reached, the queue is closed
    /// by someone else, or `shutdown` flips to `true`.
    ///
    /// The queue is always closed on return.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> SourceSummary {
        let mut summary = SourceSummary {
            frames: 0,
            bytes: 0,
        };
        let mut ticker = (self.fps > 0).then(|| {
            let mut ticker =
                tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(self.fps)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker
        });

        debug!(
            tile = self.tile,
            quality = self.quality,
            points = self.point_count(),
            fps = self.fps,
            "Source started"
        );

        let mut sequence = 0u64;
        loop {
            if self.frame_limit.is_some_and(|limit| sequence >= limit) || *shutdown.borrow() {
                break;
            }

            if let Some(ticker) = ticker.as_mut() {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }
            }

            let frame = self.generate_frame(sequence, now_millis());
            let len = frame.len() as u64;

            let accepted = tokio::select! {
                result = self.queue.enqueue(frame) => result.is_ok(),
                _ = shutdown.changed() => false,
            };
            if !accepted {
                break;
            }

            summary.frames += 1;
            summary.bytes += len;
            sequence += 1;
        }

        self.queue.close();
        info!(
            tile = self.tile,
            quality = self.quality,
            frames = summary.frames,
            bytes = summary.bytes,
            "Source finished"
        );

        summary
    }

    /// Run the source on the current tokio runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<SourceSummary> {
        tokio::spawn(self.run(shutdown))
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Small xorshift generator; payloads only need to look noisy.
struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}
