//! TON chain probes: JSON-RPC method call latencies only.

use serde_json::json;

use crate::chains::rpc::JsonRpcProbe;
use crate::collector::{Collector, CollectorContext, MetricDefinition, PollCollector};

/// Collector definitions registered for TON.
pub fn definitions() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new("consensus_block_latency_seconds", |cx: CollectorContext| {
            let probe = JsonRpcProbe::new(&cx, "getConsensusBlock", None)?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
        MetricDefinition::new("block_header_latency_seconds", |cx: CollectorContext| {
            // Fixed masterchain block; the probe measures call latency, not
            // block content.
            let probe = JsonRpcProbe::new(
                &cx,
                "getBlockHeader",
                Some(json!({
                    "workchain": -1,
                    "shard": "-9223372036854775808",
                    "seqno": 39064874,
                })),
            )?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
        MetricDefinition::new("run_get_method_latency_seconds", |cx: CollectorContext| {
            let probe = JsonRpcProbe::new(
                &cx,
                "runGetMethod",
                Some(json!({
                    "address": "EQCxE6mUtQJKFnGfaROTKOt1lZbDiiX1kCixRv7Nw2Id_sDs",
                    "method": "get_wallet_address",
                    "stack": [
                        [
                            "tvm.Slice",
                            "te6cckEBAQEAJAAAQ4AbUzrTQYTUv8s/I9ds2TSZgRjyrgl2S2LKcZMEFcxj6PARy3rF"
                        ]
                    ],
                })),
            )?;
            Ok(Box::new(PollCollector::new(cx.metric_name, probe, cx.labels, cx.config))
                as Box<dyn Collector>)
        }),
    ]
}
