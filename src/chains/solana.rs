//! Solana chain probes.
//!
//! Poll probes for `getLatestBlockhash`, `getSlot` and a canned
//! `simulateTransaction`; a per-interval streaming probe over
//! `blockSubscribe` with blockhash deduplication.

use serde_json::json;

use crate::chains::evm::latency_since;
use crate::chains::rpc::JsonRpcProbe;
use crate::chains::ws::WsSession;
use crate::collector::{
    Collector, CollectorContext, MetricDefinition, PollCollector, ProbeError, Sample,
    StreamCollector, StreamMode, StreamProbe,
};

/// Base64 no-op transfer transaction, simulated as shipped by the original
/// deployment. Providers may override it via `tx_data.transaction`.
const SIMULATE_TX_BASE64: &str = "AQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAABAAEDArczbMia1tLmq7zz4DinMNN0pJ1JtLdqIJPUw3YrGCzYAMHBsgN27lcgB6H2WQvFgyZuJYHa46puOQo9yQ8CVQbd9uHXZaGT2cvhRs7reawctIXtX1s3kTqM9YV+/wCp20C7Wj2aiuk5TReAXo+VTVg8QTHjs0UjNMMKCvpzZ+ABAgEBARU=";

/// Collector definitions registered for Solana.
pub fn definitions() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new("block_latency_seconds", |cx: CollectorContext| {
            let probe = BlockSubscribeProbe::new(&cx)?;
            Ok(Box::new(StreamCollector::new(
                cx.metric_name,
                probe,
                cx.labels,
                cx.config,
                StreamMode::PerInterval,
            )) as Box<dyn Collector>)
        }),
        MetricDefinition::new("blockhash_latency_seconds", |cx: CollectorContext| {
            let probe = JsonRpcProbe::new(&cx, "getLatestBlockhash", None)?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
        MetricDefinition::new("slot_latency_seconds", |cx: CollectorContext| {
            let probe = JsonRpcProbe::new(&cx, "getSlot", None)?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
        MetricDefinition::new(
            "simulate_transaction_latency_seconds",
            |cx: CollectorContext| {
                let transaction = cx
                    .config
                    .extra("tx_data")
                    .and_then(|d| d.get("transaction"))
                    .and_then(|t| t.as_str())
                    .unwrap_or(SIMULATE_TX_BASE64)
                    .to_string();
                let probe = JsonRpcProbe::new(
                    &cx,
                    "simulateTransaction",
                    Some(json!([transaction, {"encoding": "base64"}])),
                )?;
                Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                    as Box<dyn Collector>)
            },
        ),
    ]
}

/// Streaming probe over `blockSubscribe` (confirmed blocks, no transaction
/// details). One block per interval; repeated notifications of the same
/// blockhash are discarded.
pub struct BlockSubscribeProbe {
    ws_endpoint: String,
}

impl BlockSubscribeProbe {
    pub fn new(cx: &CollectorContext) -> Result<Self, ProbeError> {
        Ok(Self {
            ws_endpoint: cx.provider.require_ws()?.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl StreamProbe for BlockSubscribeProbe {
    type Conn = WsSession;
    type Item = serde_json::Value;

    async fn connect(&self) -> Result<WsSession, ProbeError> {
        WsSession::connect(&self.ws_endpoint).await
    }

    async fn subscribe(&self, conn: &mut WsSession) -> Result<(), ProbeError> {
        conn.send_json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "blockSubscribe",
            "params": [
                "all",
                {
                    "commitment": "confirmed",
                    "transactionDetails": "none",
                    "showRewards": false,
                },
            ],
        }))
        .await?;

        let response = conn.recv_json().await?;
        match response.get("result") {
            Some(id) if !id.is_null() => {
                conn.subscription_id = Some(id.clone());
                Ok(())
            }
            _ => Err(ProbeError::Protocol(
                "subscription to new blocks rejected".to_string(),
            )),
        }
    }

    async fn next_item(
        &self,
        conn: &mut WsSession,
    ) -> Result<Option<serde_json::Value>, ProbeError> {
        let message = conn.recv_json().await?;
        if message.get("method").and_then(|m| m.as_str()) == Some("blockNotification") {
            Ok(message.pointer("/params/result/value/block").cloned())
        } else {
            Ok(None)
        }
    }

    fn item_key(&self, item: &serde_json::Value) -> Option<String> {
        item.get("blockhash")
            .and_then(|h| h.as_str())
            .map(String::from)
    }

    fn extract(&self, item: serde_json::Value) -> Result<Vec<Sample>, ProbeError> {
        let block_time = item
            .get("blockTime")
            .and_then(|t| t.as_i64())
            .ok_or_else(|| ProbeError::Protocol("block time missing in block data".to_string()))?;
        Ok(vec![Sample::unnamed(latency_since(block_time))])
    }

    async fn unsubscribe(&self, conn: &mut WsSession) -> Result<(), ProbeError> {
        let Some(id) = conn.subscription_id.take() else {
            return Ok(());
        };
        conn.send_json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "blockUnsubscribe",
            "params": [id],
        }))
        .await?;
        let response = conn.recv_json().await?;
        if response.get("result").and_then(|r| r.as_bool()) != Some(true) {
            return Err(ProbeError::Protocol(
                "blockUnsubscribe rejected".to_string(),
            ));
        }
        Ok(())
    }

    async fn close(&self, conn: WsSession) {
        conn.close().await;
    }

    fn api_method(&self) -> &str {
        "blockSubscribe"
    }
}
