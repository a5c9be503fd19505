//! Writer integration tests over the in-memory transport.
//!
//! Tests verify:
//! - Stream index layout and construction errors
//! - Exact packet bytes and per-stream ordering
//! - Shutdown: queues closed, workers exited
//! - A failed stream does not disturb the others

use std::sync::Arc;
use std::time::Duration;

use pc_streamer::error::{ConfigError, QueueError};
use pc_streamer::queue::{Frame, FrameQueue};
use pc_streamer::transport::MemoryTransport;
use pc_streamer::writer::{ExitReason, OutgoingStream, StreamWriter, WorkerState};

use super::test_utils::{make_streams, wait_until, MemoryFixture, TWO_BY_TWO};

const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn test_two_by_two_opens_four_channels() {
    let mut fx = MemoryFixture::new(&TWO_BY_TWO, 4);

    let indices: Vec<(u32, u32, u32)> = fx
        .writer
        .descriptors()
        .iter()
        .map(|d| (d.tile, d.quality, d.index))
        .collect();
    assert_eq!(indices, vec![(0, 0, 0), (1, 0, 1), (0, 1, 2), (1, 1, 3)]);

    fx.writer.start().unwrap();
    let transport = fx.transport.clone();
    assert!(wait_until(WAIT, || transport.open_channel_count() == 4).await);
    assert_eq!(fx.transport.opened_channels(), vec![0, 1, 2, 3]);
    assert_eq!(
        fx.transport.endpoint().map(|u| u.to_string()),
        Some("memory://integration".to_string())
    );

    fx.close_all();
    fx.writer.stop().await;
}

#[test]
fn test_construction_errors() {
    let err = StreamWriter::new("tcp://h:1", "cwi1", vec![], MemoryTransport::new()).unwrap_err();
    assert_eq!(err, ConfigError::NoStreams);

    for fourcc in ["cwi", "cwi12"] {
        let (streams, _) = make_streams(&[(0, 0)], 1);
        let err =
            StreamWriter::new("tcp://h:1", fourcc, streams, MemoryTransport::new()).unwrap_err();
        assert_eq!(err, ConfigError::InvalidFourCC(fourcc.to_string()));
    }

    // Empty streams are reported before the bad code
    let err = StreamWriter::new("tcp://h:1", "x", vec![], MemoryTransport::new()).unwrap_err();
    assert_eq!(err, ConfigError::NoStreams);
}

#[test]
fn test_one_queue_cannot_feed_two_streams() {
    let queue = Arc::new(FrameQueue::new("shared", 4));
    let streams = vec![
        OutgoingStream::new(0, 0, Arc::clone(&queue)),
        OutgoingStream::new(1, 0, Arc::clone(&queue)),
    ];

    let err =
        StreamWriter::new("memory://x", "cwi1", streams, MemoryTransport::new()).unwrap_err();
    assert_eq!(err, ConfigError::SharedQueue { index: 1 });
}

// =============================================================================
// Wire Format and Ordering
// =============================================================================

#[tokio::test]
async fn test_packet_bytes_on_the_wire() {
    let mut fx = MemoryFixture::new(&[(0, 0)], 4);
    fx.writer.start().unwrap();

    fx.queues[0]
        .enqueue(Frame::new(1234, vec![0xAA, 0xBB, 0xCC]))
        .await
        .unwrap();
    assert!(fx.transport.wait_for_packets(0, 1, WAIT).await);

    let mut expected = Vec::new();
    expected.extend_from_slice(b"cwi1");
    expected.extend_from_slice(&3i32.to_le_bytes());
    expected.extend_from_slice(&1234i64.to_le_bytes());
    expected.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
    assert_eq!(fx.transport.packets(0)[0].as_ref(), expected.as_slice());

    fx.close_all();
    fx.writer.stop().await;
}

#[tokio::test]
async fn test_per_stream_fifo_order() {
    let mut fx = MemoryFixture::new(&TWO_BY_TWO, 2);
    fx.writer.start().unwrap();

    // One producer per stream, running concurrently
    let producers: Vec<_> = fx
        .queues
        .iter()
        .cloned()
        .enumerate()
        .map(|(stream, queue)| {
            tokio::spawn(async move {
                for ts in 0..50i64 {
                    let payload = vec![stream as u8; (ts % 7) as usize + 1];
                    queue.enqueue(Frame::new(ts, payload)).await.unwrap();
                }
                queue.close();
            })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap();
    }

    let report = fx.writer.stop().await;
    assert!(report.all_drained());
    assert_eq!(report.unclosed_queues, 0);
    assert_eq!(report.total_frames(), 200);

    for index in 0..4 {
        let frames = fx.transport.frames(index);
        let timestamps: Vec<i64> = frames.iter().map(|(h, _)| h.timestamp).collect();
        assert_eq!(timestamps, (0..50).collect::<Vec<_>>(), "stream {}", index);
        for (header, payload) in &frames {
            assert_eq!(header.payload_len(), payload.len());
            assert!(payload.iter().all(|b| *b == index as u8));
        }
    }
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_stop_closes_all_queues_and_joins_workers() {
    let mut fx = MemoryFixture::new(&TWO_BY_TWO, 4);
    fx.writer.start().unwrap();

    fx.queues[1].enqueue(Frame::new(7, vec![1u8; 8])).await.unwrap();
    fx.queues[1].close();

    // Queued frames are sent before the worker exits
    fx.queues[3].enqueue(Frame::new(1, vec![3u8; 8])).await.unwrap();
    fx.queues[3].enqueue(Frame::new(2, vec![3u8; 8])).await.unwrap();

    let report = fx.writer.stop().await;

    assert_eq!(report.unclosed_queues, 3);
    assert_eq!(report.exits.len(), 4);
    assert!(report.all_drained());
    assert!(fx.queues.iter().all(|q| q.is_closed()));
    assert!(!fx.writer.is_running());
    assert_eq!(fx.transport.open_channel_count(), 0);
    assert_eq!(fx.transport.packet_count(1), 1);
    assert_eq!(fx.transport.packet_count(3), 2);
    for index in 0..4 {
        assert_eq!(fx.state(index), WorkerState::Stopped);
    }

    // Producers see the closed queue
    assert_eq!(
        fx.queues[0].enqueue(Frame::new(0, vec![0u8])).await,
        Err(QueueError::Closed)
    );

    // A second stop has nothing left to do
    let again = fx.writer.stop().await;
    assert_eq!(again.unclosed_queues, 0);
    assert!(again.exits.is_empty());
}

#[tokio::test]
async fn test_close_wakes_idle_worker() {
    let mut fx = MemoryFixture::new(&[(0, 0)], 4);
    fx.writer.start().unwrap();
    assert!(wait_until(WAIT, || fx.state(0) == WorkerState::Running).await);

    fx.queues[0].close();

    assert!(wait_until(WAIT, || fx.state(0) == WorkerState::Stopped).await);
    let report = fx.writer.stop().await;
    assert_eq!(report.unclosed_queues, 0);
    assert_eq!(report.exits[0].reason, ExitReason::Drained);
}

// =============================================================================
// Failure Isolation
// =============================================================================

#[tokio::test]
async fn test_failed_stream_does_not_stop_others() {
    let mut fx = MemoryFixture::new(&TWO_BY_TWO, 4);
    fx.transport.break_channel(2);
    fx.writer.start().unwrap();

    for (i, queue) in fx.queues.iter().enumerate() {
        queue.enqueue(Frame::new(0, vec![i as u8; 4])).await.unwrap();
    }

    // Stream 2 gives up on its own and closes its queue
    assert!(wait_until(WAIT, || fx.state(2) == WorkerState::Stopped).await);
    assert!(fx.queues[2].is_closed());
    assert_eq!(
        fx.queues[2].enqueue(Frame::new(1, vec![0u8])).await,
        Err(QueueError::Closed)
    );

    // The others keep going
    for index in [0, 1, 3] {
        fx.queues[index as usize]
            .enqueue(Frame::new(1, vec![9u8; 4]))
            .await
            .unwrap();
        assert!(fx.transport.wait_for_packets(index, 2, WAIT).await);
        assert_eq!(fx.state(index), WorkerState::Running);
    }

    fx.close_all();
    let report = fx.writer.stop().await;

    for exit in &report.exits {
        let expected = if exit.index == 2 {
            ExitReason::TransportFailed
        } else {
            ExitReason::Drained
        };
        assert_eq!(exit.reason, expected, "stream {}", exit.index);
    }
    assert_eq!(fx.transport.packet_count(2), 0);
    assert_eq!(report.total_frames(), 6);
}

#[tokio::test]
async fn test_recoverable_send_errors_are_skipped() {
    let mut fx = MemoryFixture::new(&[(0, 0)], 4);
    fx.transport.fail_next_sends(0, 1);
    fx.writer.start().unwrap();

    for ts in 0..3 {
        fx.queues[0].enqueue(Frame::new(ts, vec![1u8; 2])).await.unwrap();
    }
    assert!(fx.transport.wait_for_packets(0, 2, WAIT).await);

    fx.close_all();
    let report = fx.writer.stop().await;

    let timestamps: Vec<i64> = fx
        .transport
        .frames(0)
        .iter()
        .map(|(h, _)| h.timestamp)
        .collect();
    assert_eq!(timestamps, vec![1, 2]);
    assert_eq!(report.exits[0].send_errors, 1);
    assert_eq!(report.exits[0].reason, ExitReason::Drained);
}

#[tokio::test]
async fn test_refused_channel_closes_its_queue() {
    let mut fx = MemoryFixture::new(&[(0, 0), (1, 0)], 4);
    fx.transport.refuse_open(1);
    fx.writer.start().unwrap();

    assert!(wait_until(WAIT, || fx.queues[1].is_closed()).await);

    fx.queues[0].enqueue(Frame::new(0, vec![1u8])).await.unwrap();
    assert!(fx.transport.wait_for_packets(0, 1, WAIT).await);

    fx.close_all();
    let report = fx.writer.stop().await;
    assert_eq!(report.exits[1].reason, ExitReason::OpenFailed);
    assert_eq!(report.exits[0].reason, ExitReason::Drained);
}
