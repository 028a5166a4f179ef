//! HTTP Integration Tests for Chainprobe
//!
//! Covers the metrics exposition endpoint and health probe.

use std::sync::Arc;

use serde_json::Value;
use tokio::net::TcpListener;

use chainprobe::collector::Sample;
use chainprobe::metric::{LabelKey, LabelSet, MetricHandle};
use chainprobe::server::{AppState, create_router};

// =============================================================================
// Test Helpers
// =============================================================================

fn seeded_handles() -> Arc<[MetricHandle]> {
    let poll = MetricHandle::new(
        "block_number_latency_seconds",
        LabelSet::new("eu-west", "us-east", "Ethereum", "infura-mainnet"),
    );
    poll.set_label(LabelKey::ApiMethod, "eth_blockNumber");
    poll.publish(vec![Sample::unnamed(0.42)]);

    let stream = MetricHandle::new(
        "block_latency_seconds",
        LabelSet::new("eu-west", "us-east", "Solana", "triton"),
    );
    stream.set_label(LabelKey::ApiMethod, "blockSubscribe");
    stream.publish(vec![Sample::unnamed(1.5)]);

    let pending = MetricHandle::new(
        "gas_price_latency_seconds",
        LabelSet::new("eu-west", "us-east", "Ethereum", "infura-mainnet"),
    );

    vec![poll, stream, pending].into()
}

/// Start test server and return base URL.
async fn start_test_server(collectors: Arc<[MetricHandle]>) -> String {
    let router = create_router(AppState { collectors });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    format!("http://{}", addr)
}

// =============================================================================
// Health Probe Tests
// =============================================================================

#[tokio::test]
async fn test_healthz() {
    let base_url = start_test_server(seeded_handles()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/healthz", base_url))
        .send()
        .await
        .expect("Failed to send healthz request");
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("Failed to parse healthz response");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["collectors"], 3);
}

// =============================================================================
// Metrics Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_metrics_exposition() {
    let base_url = start_test_server(seeded_handles()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/metrics", base_url))
        .send()
        .await
        .expect("Failed to fetch metrics");
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );

    let body = resp.text().await.expect("Failed to read body");
    let lines: Vec<&str> = body.lines().collect();

    // The pending collector contributes nothing.
    assert_eq!(lines.len(), 2);

    // Registration order, full label context, trailing value.
    assert!(lines[0].starts_with("block_number_latency_seconds{"));
    assert!(lines[0].contains("source_region=\"eu-west\""));
    assert!(lines[0].contains("blockchain=\"Ethereum\""));
    assert!(lines[0].contains("api_method=\"eth_blockNumber\""));
    assert!(lines[0].contains("response_status=\"success\""));
    assert!(lines[0].ends_with(" 0.42"));

    assert!(lines[1].starts_with("block_latency_seconds{"));
    assert!(lines[1].contains("provider=\"triton\""));
    assert!(lines[1].ends_with(" 1.5"));
}

#[tokio::test]
async fn test_metrics_empty_without_collectors() {
    let base_url = start_test_server(Vec::new().into()).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/metrics", base_url))
        .send()
        .await
        .expect("Failed to fetch metrics");
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_metrics_reflect_failure_state() {
    let handle = MetricHandle::new(
        "blockhash_latency_seconds",
        LabelSet::new("eu-west", "us-east", "Solana", "triton"),
    );
    handle.publish(vec![Sample::unnamed(0.2)]);
    handle.mark_failed();

    let base_url = start_test_server(vec![handle].into()).await;
    let client = reqwest::Client::new();

    let body = client
        .get(format!("{}/metrics", base_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    // Last good value is retained, the status label flips.
    assert!(body.contains("response_status=\"failed\""));
    assert!(body.trim_end().ends_with(" 0.2"));
}
