//! Configuration management for pc-streamer.
//!
//! This module provides the command-line interface of the binary:
//! - Command-line arguments via clap
//! - Environment variables with `PCS_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `pc-streamer send` - Produce synthetic point-cloud tiles and transmit
//!   them with a [`StreamWriter`](crate::writer::StreamWriter)
//! - `pc-streamer receive` - Listen for the streams of a sender and report
//!   what arrives
//!
//! # Environment Variables
//!
//! - `PCS_URL` - Destination endpoint of `send` (default: tcp://127.0.0.1:9000)
//! - `PCS_FOURCC` - Media-type code (default: cwi1)
//! - `PCS_TILES` - Number of tiles (default: 2)
//! - `PCS_QUALITIES` - Number of quality levels (default: 2)
//! - `PCS_FPS` - Frames per second per stream (default: 15)
//! - `PCS_POINTS` - Points per quality-0 frame (default: 1000)
//! - `PCS_DURATION` - Seconds to send, 0 for until Ctrl-C (default: 0)
//! - `PCS_QUEUE_CAPACITY` - Frames per input queue (default: 4)
//! - `PCS_DROP_WHEN_FULL` - Evict the oldest frame instead of blocking
//! - `PCS_STATS_INTERVAL` - Statistics interval in seconds, 0 disables (default: 10)
//! - `PCS_STATUS_ADDR` - Bind address of the HTTP status endpoint
//! - `PCS_DRY_RUN` - Use the in-memory transport instead of TCP
//! - `PCS_HOST` / `PCS_BASE_PORT` / `PCS_STREAMS` - Receiver binding

use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::protocol::FourCC;
use crate::protocol::{DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD_SIZE};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::source::{DEFAULT_FPS, DEFAULT_POINTS_PER_FRAME, POINT_RECORD_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default destination endpoint.
pub const DEFAULT_URL: &str = "tcp://127.0.0.1:9000";

/// Default media-type code.
pub const DEFAULT_FOURCC: &str = "cwi1";

/// Default number of tiles.
pub const DEFAULT_TILES: u32 = 2;

/// Default number of quality levels.
pub const DEFAULT_QUALITIES: u32 = 2;

/// Default statistics interval in seconds.
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 10;

/// Default receiver bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default receiver base port.
pub const DEFAULT_BASE_PORT: u16 = 9000;

/// Upper bound on tiles × qualities accepted on the command line.
pub const MAX_STREAMS: u32 = 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pc-streamer - Multi-stream point-cloud frame writer.
#[derive(Parser, Debug, Clone)]
#[command(name = "pc-streamer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Consume the parsed arguments and return the selected command.
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate synthetic point-cloud tiles and send them.
    Send(SendConfig),

    /// Receive the streams of a sender and log every packet.
    Receive(ReceiveConfig),
}

// =============================================================================
// Send Command
// =============================================================================

/// Options of `pc-streamer send`.
#[derive(Args, Debug, Clone)]
pub struct SendConfig {
    // =========================================================================
    // Writer Configuration
    // =========================================================================
    /// Destination endpoint. Stream `i` goes to port + i.
    #[arg(long, default_value = DEFAULT_URL, env = "PCS_URL")]
    pub url: String,

    /// Four-character media-type code carried in every header.
    #[arg(long, default_value = DEFAULT_FOURCC, env = "PCS_FOURCC")]
    pub fourcc: String,

    /// Number of spatial tiles.
    #[arg(long, default_value_t = DEFAULT_TILES, env = "PCS_TILES")]
    pub tiles: u32,

    /// Number of quality levels per tile.
    #[arg(long, default_value_t = DEFAULT_QUALITIES, env = "PCS_QUALITIES")]
    pub qualities: u32,

    /// Use the in-memory transport instead of TCP.
    #[arg(long, default_value_t = false, env = "PCS_DRY_RUN")]
    pub dry_run: bool,

    /// Disable Nagle's algorithm on TCP sub-channels.
    #[arg(long, default_value_t = true, env = "PCS_NODELAY", action = clap::ArgAction::Set)]
    pub nodelay: bool,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Frames per second per stream (0 = as fast as possible).
    #[arg(long, default_value_t = DEFAULT_FPS, env = "PCS_FPS")]
    pub fps: u32,

    /// Points in a quality-0 frame; each quality level adds as many again.
    #[arg(long, default_value_t = DEFAULT_POINTS_PER_FRAME, env = "PCS_POINTS")]
    pub points: usize,

    /// Seconds to send before stopping (0 = until Ctrl-C).
    #[arg(long, default_value_t = 0, env = "PCS_DURATION")]
    pub duration: u64,

    // =========================================================================
    // Queue Configuration
    // =========================================================================
    /// Frames each input queue holds.
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY, env = "PCS_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Evict the oldest queued frame instead of blocking the producer.
    #[arg(long, default_value_t = false, env = "PCS_DROP_WHEN_FULL")]
    pub drop_when_full: bool,

    // =========================================================================
    // Observability
    // =========================================================================
    /// Statistics interval in seconds (0 = disabled).
    #[arg(long, default_value_t = DEFAULT_STATS_INTERVAL_SECS, env = "PCS_STATS_INTERVAL")]
    pub stats_interval: u64,

    /// Serve stream statistics over HTTP on this address (e.g. 127.0.0.1:8080).
    #[arg(long, env = "PCS_STATUS_ADDR")]
    pub status_addr: Option<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SendConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Err(e) = FourCC::parse(&self.fourcc) {
            return Err(e.to_string());
        }

        if self.tiles == 0 || self.qualities == 0 {
            return Err("tiles and qualities must be greater than 0".to_string());
        }
        if self.stream_count() > MAX_STREAMS as u64 {
            return Err(format!(
                "tiles x qualities must not exceed {} streams",
                MAX_STREAMS
            ));
        }

        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".to_string());
        }

        // The top quality level carries points × qualities points per frame
        let largest_frame = usize::try_from(self.qualities)
            .ok()
            .and_then(|q| self.points.checked_mul(q))
            .and_then(|p| p.checked_mul(POINT_RECORD_SIZE));
        if !largest_frame.is_some_and(|size| size <= MAX_PAYLOAD_SIZE) {
            return Err(format!(
                "{} points x {} qualities exceeds the {} byte frame limit",
                self.points, self.qualities, MAX_PAYLOAD_SIZE
            ));
        }

        if !self.dry_run && !self.url.starts_with("tcp://") {
            return Err(format!(
                "URL \"{}\" is not a tcp:// endpoint. Use --dry-run for the in-memory transport",
                self.url
            ));
        }

        Ok(())
    }

    /// Number of streams the writer will carry.
    pub fn stream_count(&self) -> u64 {
        u64::from(self.tiles) * u64::from(self.qualities)
    }

    /// (tile, quality) pairs, quality-major.
    pub fn stream_pairs(&self) -> Vec<(u32, u32)> {
        (0..self.qualities)
            .flat_map(|quality| (0..self.tiles).map(move |tile| (tile, quality)))
            .collect()
    }

    /// Statistics interval, `None` when disabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval > 0).then(|| Duration::from_secs(self.stats_interval))
    }

    /// Run duration, `None` to run until interrupted.
    pub fn run_duration(&self) -> Option<Duration> {
        (self.duration > 0).then(|| Duration::from_secs(self.duration))
    }
}

// =============================================================================
// Receive Command
// =============================================================================

/// Options of `pc-streamer receive`.
#[derive(Args, Debug, Clone)]
pub struct ReceiveConfig {
    /// Host address to listen on.
    #[arg(long, default_value = DEFAULT_HOST, env = "PCS_HOST")]
    pub host: String,

    /// Port of stream 0. Stream `i` arrives on base_port + i.
    #[arg(long, default_value_t = DEFAULT_BASE_PORT, env = "PCS_BASE_PORT")]
    pub base_port: u16,

    /// Number of streams to listen for.
    #[arg(long, default_value_t = DEFAULT_TILES * DEFAULT_QUALITIES, env = "PCS_STREAMS")]
    pub streams: u32,

    /// Largest payload accepted, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD, env = "PCS_MAX_PAYLOAD")]
    pub max_payload: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ReceiveConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.streams == 0 {
            return Err("streams must be greater than 0".to_string());
        }
        if u64::from(self.base_port) + u64::from(self.streams) - 1 > u64::from(u16::MAX) {
            return Err(format!(
                "base_port {} + {} streams exceeds the port range",
                self.base_port, self.streams
            ));
        }
        if self.max_payload == 0 {
            return Err("max_payload must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
