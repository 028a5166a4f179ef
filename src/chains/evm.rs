//! EVM chain probes (Ethereum, Base, and compatible networks).
//!
//! Poll probes for `eth_blockNumber`, `eth_gasPrice` and a simulated
//! contract call via `eth_call`; a streaming probe for block propagation
//! latency over an `eth_subscribe newHeads` subscription.

use chrono::Utc;
use serde_json::json;

use crate::chains::rpc::JsonRpcProbe;
use crate::chains::ws::WsSession;
use crate::collector::{
    Collector, CollectorContext, MetricDefinition, PollCollector, ProbeError, Sample,
    StreamCollector, StreamMode, StreamProbe,
};

/// Collector definitions registered for every EVM-compatible blockchain.
pub fn definitions() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new("block_latency_seconds", |cx: CollectorContext| {
            let probe = NewHeadsProbe::new(&cx)?;
            Ok(Box::new(StreamCollector::new(
                cx.metric_name,
                probe,
                cx.labels,
                cx.config,
                StreamMode::Continuous,
            )) as Box<dyn Collector>)
        }),
        MetricDefinition::new("eth_call_latency_seconds", |cx: CollectorContext| {
            let params = eth_call_params(&cx)?;
            let probe = JsonRpcProbe::new(&cx, "eth_call", Some(params))?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
        MetricDefinition::new("block_number_latency_seconds", |cx: CollectorContext| {
            let probe = JsonRpcProbe::new(&cx, "eth_blockNumber", None)?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
        MetricDefinition::new("gas_price_latency_seconds", |cx: CollectorContext| {
            let probe = JsonRpcProbe::new(&cx, "eth_gasPrice", None)?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
    ]
}

/// Build `eth_call` params from the provider's opaque `tx_data` payload:
/// `{to, data, from?}` simulated against the latest block.
fn eth_call_params(cx: &CollectorContext) -> Result<serde_json::Value, ProbeError> {
    let tx_data = cx.config.extra("tx_data").ok_or_else(|| {
        ProbeError::Config(format!(
            "provider '{}' has no tx_data for eth_call",
            cx.provider.name
        ))
    })?;
    let to = tx_data
        .get("to")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProbeError::Config("tx_data is missing 'to'".to_string()))?;
    let data = tx_data
        .get("data")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProbeError::Config("tx_data is missing 'data'".to_string()))?;
    let from = tx_data
        .get("from")
        .and_then(|v| v.as_str())
        .unwrap_or("0x0000000000000000000000000000000000000000");

    Ok(json!([{"from": from, "to": to, "data": data}, "latest"]))
}

/// Streaming probe subscribed to `newHeads`: block latency is the gap
/// between now and the block's own timestamp.
pub struct NewHeadsProbe {
    ws_endpoint: String,
}

impl NewHeadsProbe {
    pub fn new(cx: &CollectorContext) -> Result<Self, ProbeError> {
        Ok(Self {
            ws_endpoint: cx.provider.require_ws()?.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl StreamProbe for NewHeadsProbe {
    type Conn = WsSession;
    type Item = serde_json::Value;

    async fn connect(&self) -> Result<WsSession, ProbeError> {
        WsSession::connect(&self.ws_endpoint).await
    }

    async fn subscribe(&self, conn: &mut WsSession) -> Result<(), ProbeError> {
        conn.send_json(&json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": "eth_subscribe",
            "params": ["newHeads"],
        }))
        .await?;

        let response = conn.recv_json().await?;
        match response.get("result") {
            Some(id) if !id.is_null() => {
                conn.subscription_id = Some(id.clone());
                Ok(())
            }
            _ => Err(ProbeError::Protocol(
                "subscription to newHeads rejected".to_string(),
            )),
        }
    }

    async fn next_item(
        &self,
        conn: &mut WsSession,
    ) -> Result<Option<serde_json::Value>, ProbeError> {
        let message = conn.recv_json().await?;
        if message.get("method").and_then(|m| m.as_str()) == Some("eth_subscription") {
            Ok(message.pointer("/params/result").cloned())
        } else {
            Ok(None)
        }
    }

    fn item_key(&self, item: &serde_json::Value) -> Option<String> {
        item.get("hash").and_then(|h| h.as_str()).map(String::from)
    }

    fn extract(&self, item: serde_json::Value) -> Result<Vec<Sample>, ProbeError> {
        let timestamp = item
            .get("timestamp")
            .and_then(|t| t.as_str())
            .ok_or_else(|| ProbeError::Protocol("block header has no timestamp".to_string()))?;
        let block_time = parse_hex_seconds(timestamp)?;
        Ok(vec![Sample::unnamed(latency_since(block_time))])
    }

    async fn unsubscribe(&self, conn: &mut WsSession) -> Result<(), ProbeError> {
        let Some(id) = conn.subscription_id.take() else {
            return Ok(());
        };
        conn.send_json(&json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": "eth_unsubscribe",
            "params": [id],
        }))
        .await?;
        let response = conn.recv_json().await?;
        if response.get("result").and_then(|r| r.as_bool()) != Some(true) {
            return Err(ProbeError::Protocol(
                "eth_unsubscribe rejected".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self, conn: WsSession) {
        conn.close().await;
    }

    fn api_method(&self) -> &str {
        "eth_subscribe"
    }
}

/// Parse a `0x`-prefixed hex timestamp into unix seconds.
fn parse_hex_seconds(hex: &str) -> Result<i64, ProbeError> {
    i64::from_str_radix(hex.trim_start_matches("0x"), 16)
        .map_err(|e| ProbeError::Protocol(format!("invalid hex timestamp '{hex}': {e}")))
}

/// Seconds elapsed since a unix timestamp.
pub(crate) fn latency_since(unix_seconds: i64) -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0 - unix_seconds as f64
}
