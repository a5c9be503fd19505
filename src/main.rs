//! pc-streamer - Multi-stream point-cloud frame writer.
//!
//! This binary wires synthetic producers to a stream writer (`send`) or
//! listens for a sender's streams (`receive`).

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pc_streamer::{
    config::{Cli, Command, ReceiveConfig, SendConfig},
    queue::{FrameQueue, OverflowPolicy},
    receiver::{TcpReceiver, DEFAULT_CHANNEL_CAPACITY},
    server::{create_router, RouterConfig},
    source::SyntheticSource,
    transport::{MemoryTransport, TcpTransport, Transport},
    writer::{ExitReason, OutgoingStream, StatsHandle, StreamWriter, WriterConfig},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Send(config) => run_send(config).await,
        Command::Receive(config) => run_receive(config).await,
    }
}

// =============================================================================
// Send Command
// =============================================================================

async fn run_send(config: SendConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Configuration:");
    info!("  URL: {}", config.url);
    info!("  4CC: {}", config.fourcc);
    info!(
        "  Streams: {} tiles x {} qualities",
        config.tiles, config.qualities
    );
    info!("  Source: {} fps, {} points/frame", config.fps, config.points);
    if config.dry_run {
        warn!("  Transport: in-memory (dry run), nothing leaves this process");
    }

    if config.dry_run {
        send_with(config, MemoryTransport::new()).await
    } else {
        let transport = TcpTransport::new().with_nodelay(config.nodelay);
        send_with(config, transport).await
    }
}

async fn send_with<T: Transport>(config: SendConfig, transport: T) -> ExitCode {
    let policy = if config.drop_when_full {
        OverflowPolicy::DropOldest
    } else {
        OverflowPolicy::Block
    };

    let mut streams = Vec::new();
    let mut sources = Vec::new();
    for (tile, quality) in config.stream_pairs() {
        let queue = Arc::new(FrameQueue::with_policy(
            format!("tile{}.q{}", tile, quality),
            config.queue_capacity,
            policy,
        ));
        streams.push(OutgoingStream::new(tile, quality, Arc::clone(&queue)));
        sources.push(
            SyntheticSource::new(tile, quality, queue)
                .with_fps(config.fps)
                .with_points_per_frame(config.points),
        );
    }

    let writer_config = match config.stats_interval() {
        Some(interval) => WriterConfig::default().with_stats_interval(interval),
        None => WriterConfig::default().without_stats(),
    };

    let writer = StreamWriter::with_config(
        &config.url,
        &config.fourcc,
        streams,
        transport,
        writer_config,
    );
    let mut writer = match writer {
        Ok(writer) => writer,
        Err(e) => {
            error!("Failed to create writer: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref addr) = config.status_addr {
        if let Err(e) = spawn_status_server(addr, writer.stats_handle()).await {
            error!("Failed to start status endpoint on {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = writer.start() {
        error!("Failed to start writer: {}", e);
        return ExitCode::FAILURE;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let producers: Vec<_> = sources
        .into_iter()
        .map(|source| source.spawn(shutdown_rx.clone()))
        .collect();

    wait_for_shutdown(config.run_duration()).await;
    let _ = shutdown_tx.send(true);

    let mut produced = 0u64;
    for producer in producers {
        match producer.await {
            Ok(summary) => produced += summary.frames,
            Err(e) => error!("Producer task failed: {}", e),
        }
    }

    let report = writer.stop().await;
    info!(
        "Stopped: {} frames produced, {} frames sent on {} streams",
        produced,
        report.total_frames(),
        report.exits.len()
    );

    if report.all_drained() {
        ExitCode::SUCCESS
    } else {
        for exit in report
            .exits
            .iter()
            .filter(|e| e.reason != ExitReason::Drained)
        {
            warn!("  stream {} ended early: {:?}", exit.index, exit.reason);
        }
        ExitCode::FAILURE
    }
}

/// Bind the status endpoint and serve it in the background.
async fn spawn_status_server(addr: &str, stats: StatsHandle) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let router = create_router(stats, RouterConfig::new());

    info!("  Status endpoint: http://{}/streams", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Status endpoint error: {}", e);
        }
    });

    Ok(())
}

/// Wait for Ctrl-C, or for `duration` if one is given.
async fn wait_for_shutdown(duration: Option<Duration>) {
    let timer = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Interrupted, shutting down");
        }
        _ = timer => info!("Run duration elapsed, shutting down"),
    }
}

// =============================================================================
// Receive Command
// =============================================================================

async fn run_receive(config: ReceiveConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let receiver = match TcpReceiver::bind(&config.host, config.base_port, 0..config.streams).await
    {
        Ok(receiver) => receiver.with_max_payload(config.max_payload),
        Err(e) => {
            error!("Failed to start receiver: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Listening on {}:{}-{}",
        config.host,
        config.base_port,
        u32::from(config.base_port) + config.streams - 1
    );

    let (handle, mut packets) = receiver.spawn(DEFAULT_CHANNEL_CAPACITY);
    let mut received = 0u64;

    loop {
        tokio::select! {
            packet = packets.recv() => match packet {
                Some(packet) => {
                    received += 1;
                    info!(
                        index = packet.index,
                        fourcc = %packet.header.fourcc,
                        length = packet.header.length,
                        timestamp = packet.header.timestamp,
                        "Packet received"
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    handle.shutdown();
    info!("Received {} packets", received);
    ExitCode::SUCCESS
}

// =============================================================================
// Logging
// =============================================================================

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pc_streamer=debug,tower_http=debug"
    } else {
        "pc_streamer=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
