//! TCP end-to-end tests.
//!
//! A writer over the TCP transport sends to a TCP receiver on consecutive
//! local ports. Tests verify:
//! - Each stream arrives on `base_port + index`
//! - Headers and payloads survive the trip unchanged
//! - A missing listener fails only the affected stream

use std::collections::HashMap;
use std::time::Duration;

use pc_streamer::queue::Frame;
use pc_streamer::receiver::ReceivedPacket;
use pc_streamer::transport::TcpTransport;
use pc_streamer::writer::{ExitReason, StreamWriter, WriterConfig};

use super::test_utils::{bind_receiver, make_streams, TWO_BY_TWO};

const FRAMES_PER_STREAM: i64 = 10;

#[tokio::test]
async fn test_two_by_two_over_tcp() {
    let (receiver, base_port) = bind_receiver(4).await;
    let (handle, mut rx) = receiver.spawn(256);

    let (streams, queues) = make_streams(&TWO_BY_TWO, 4);
    let mut writer = StreamWriter::with_config(
        &format!("tcp://127.0.0.1:{}", base_port),
        "cwi1",
        streams,
        TcpTransport::new(),
        WriterConfig::default().without_stats(),
    )
    .unwrap();
    writer.start().unwrap();

    for (stream, queue) in queues.iter().enumerate() {
        for ts in 0..FRAMES_PER_STREAM {
            let payload = vec![stream as u8; 100 + ts as usize];
            queue.enqueue(Frame::new(ts, payload)).await.unwrap();
        }
        queue.close();
    }

    let report = writer.stop().await;
    assert!(report.all_drained());

    let mut by_index: HashMap<u32, Vec<ReceivedPacket>> = HashMap::new();
    let total = 4 * FRAMES_PER_STREAM as usize;
    for _ in 0..total {
        let packet = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("packet before timeout")
            .expect("receiver still running");
        by_index.entry(packet.index).or_default().push(packet);
    }

    for index in 0..4u32 {
        let packets = &by_index[&index];
        let timestamps: Vec<i64> = packets.iter().map(|p| p.header.timestamp).collect();
        assert_eq!(timestamps, (0..FRAMES_PER_STREAM).collect::<Vec<_>>());

        for packet in packets {
            assert_eq!(packet.header.fourcc.as_bytes(), *b"cwi1");
            assert_eq!(
                packet.payload.len(),
                100 + packet.header.timestamp as usize
            );
            assert!(packet.payload.iter().all(|b| *b == index as u8));
        }
    }

    handle.shutdown();
}

#[tokio::test]
async fn test_missing_listener_fails_only_its_stream() {
    // Listen on streams 0 and 1 only; stream 2 has nobody to connect to
    let (receiver, base_port) = bind_receiver(2).await;
    let (handle, mut rx) = receiver.spawn(16);

    let (streams, queues) = make_streams(&[(0, 0), (1, 0), (2, 0)], 4);
    let mut writer = StreamWriter::with_config(
        &format!("tcp://127.0.0.1:{}", base_port),
        "cwi1",
        streams,
        TcpTransport::new().with_connect_timeout(Duration::from_millis(500)),
        WriterConfig::default().without_stats(),
    )
    .unwrap();
    writer.start().unwrap();

    queues[0].enqueue(Frame::new(1, vec![0u8; 10])).await.unwrap();
    queues[1].enqueue(Frame::new(2, vec![1u8; 10])).await.unwrap();

    let mut received = Vec::new();
    for _ in 0..2 {
        let packet = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("packet before timeout")
            .expect("receiver still running");
        received.push(packet.index);
    }
    received.sort_unstable();
    assert_eq!(received, vec![0, 1]);

    queues[0].close();
    queues[1].close();
    let report = writer.stop().await;

    assert_eq!(report.exits[0].reason, ExitReason::Drained);
    assert_eq!(report.exits[1].reason, ExitReason::Drained);
    assert_eq!(report.exits[2].reason, ExitReason::OpenFailed);

    handle.shutdown();
}
