//! Status endpoint integration tests.
//!
//! Tests verify:
//! - `/health` reports the service version
//! - `/streams` reflects live writer progress and worker states
//! - `/streams/{index}` returns one stream or 404

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use pc_streamer::queue::Frame;
use pc_streamer::{create_router, RouterConfig};

use super::test_utils::{MemoryFixture, TWO_BY_TWO};

async fn get_json(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_endpoint() {
    let fx = MemoryFixture::new(&TWO_BY_TWO, 4);
    let router = create_router(fx.writer.stats_handle(), RouterConfig::new());

    let (status, json) = get_json(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_streams_endpoint_tracks_writer() {
    let mut fx = MemoryFixture::new(&TWO_BY_TWO, 4);
    let router = create_router(
        fx.writer.stats_handle(),
        RouterConfig::new().with_tracing(false),
    );

    let (status, json) = get_json(&router, "/streams").await;
    assert_eq!(status, StatusCode::OK);
    let streams = json.as_array().unwrap();
    assert_eq!(streams.len(), 4);
    assert!(streams.iter().all(|s| s["state"] == "created"));

    fx.writer.start().unwrap();
    fx.queues[2]
        .enqueue(Frame::new(5, vec![0u8; 32]))
        .await
        .unwrap();
    assert!(
        fx.transport
            .wait_for_packets(2, 1, Duration::from_secs(2))
            .await
    );
    fx.queues[0].close();

    let (_, json) = get_json(&router, "/streams/2").await;
    assert_eq!(json["tile"], 0);
    assert_eq!(json["quality"], 1);
    assert_eq!(json["frames"], 1);
    assert_eq!(json["bytes"], 32);

    let (_, json) = get_json(&router, "/streams/0").await;
    assert_eq!(json["queue_closed"], true);

    fx.close_all();
    fx.writer.stop().await;

    let (_, json) = get_json(&router, "/streams").await;
    let streams = json.as_array().unwrap();
    assert!(streams.iter().all(|s| s["state"] == "stopped"));
    assert!(streams.iter().all(|s| s["queue_closed"] == true));
}

#[tokio::test]
async fn test_unknown_stream_is_404() {
    let fx = MemoryFixture::new(&[(0, 0)], 1);
    let router = create_router(fx.writer.stats_handle(), RouterConfig::new());

    let (status, json) = get_json(&router, "/streams/42").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}
