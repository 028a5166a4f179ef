//! Generic JSON-RPC call latency probe.
//!
//! Measures the wall time of one JSON-RPC request/response against the
//! provider's HTTP endpoint, body fully read and parsed.

use std::time::Instant;

use reqwest::Client;
use serde_json::json;

use crate::collector::{CollectorContext, PollProbe, ProbeError, Sample};

/// Polls a JSON-RPC method over HTTP and reports the response latency in
/// seconds. Chain modules parameterize it with the method and params.
pub struct JsonRpcProbe {
    client: Client,
    endpoint: String,
    method: String,
    params: Option<serde_json::Value>,
}

impl JsonRpcProbe {
    /// Build a probe for `method` against the context's HTTP endpoint.
    pub fn new(
        cx: &CollectorContext,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
    ) -> Result<Self, ProbeError> {
        let endpoint = cx.provider.require_http()?.to_string();
        let client = Client::builder()
            .timeout(cx.config.timeout)
            .build()
            .map_err(|e| ProbeError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            method: method.into(),
            params,
        })
    }

    fn request_body(&self) -> serde_json::Value {
        let mut body = json!({
            "id": 1,
            "jsonrpc": "2.0",
            "method": self.method,
        });
        if let Some(params) = &self.params {
            body["params"] = params.clone();
        }
        body
    }
}

#[async_trait::async_trait]
impl PollProbe for JsonRpcProbe {
    type Data = f64;

    async fn fetch(&self) -> Result<f64, ProbeError> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&self.request_body())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Transport(format!(
                "unexpected status code: {status}"
            )));
        }

        // Latency covers the fully-read and parsed body, not just headers.
        response.json::<serde_json::Value>().await?;
        Ok(start.elapsed().as_secs_f64())
    }

    fn extract(&self, latency: f64) -> Result<Vec<Sample>, ProbeError> {
        Ok(vec![Sample::unnamed(latency)])
    }

    fn api_method(&self) -> &str {
        &self.method
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collector::ProviderContext;
    use crate::metric::{LabelSet, MetricConfig};

    fn context(http: Option<&str>) -> CollectorContext {
        CollectorContext {
            metric_name: "response_latency_seconds".to_string(),
            labels: LabelSet::new("eu", "us", "Ethereum", "p"),
            config: MetricConfig::new(Duration::from_secs(5), Duration::from_secs(30)),
            provider: ProviderContext {
                name: "p".to_string(),
                blockchain: "Ethereum".to_string(),
                region: "us".to_string(),
                http_endpoint: http.map(String::from),
                ws_endpoint: None,
            },
        }
    }

    #[test]
    fn test_request_body_without_params() {
        let probe =
            JsonRpcProbe::new(&context(Some("http://localhost:8545")), "eth_blockNumber", None)
                .unwrap();
        let body = probe.request_body();
        assert_eq!(body["method"], "eth_blockNumber");
        assert_eq!(body["jsonrpc"], "2.0");
        assert!(body.get("params").is_none());
    }

    #[test]
    fn test_request_body_with_params() {
        let probe = JsonRpcProbe::new(
            &context(Some("http://localhost:8545")),
            "eth_call",
            Some(json!([{"to": "0xabc", "data": "0x1"}, "latest"])),
        )
        .unwrap();
        let body = probe.request_body();
        assert_eq!(body["params"][0]["to"], "0xabc");
        assert_eq!(body["params"][1], "latest");
    }

    #[test]
    fn test_missing_http_endpoint_is_config_fault() {
        let err = JsonRpcProbe::new(&context(None), "eth_blockNumber", None)
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }

    #[test]
    fn test_extract_is_identity() {
        let probe =
            JsonRpcProbe::new(&context(Some("http://localhost:8545")), "getSlot", None).unwrap();
        assert_eq!(probe.extract(0.15).unwrap(), vec![Sample::unnamed(0.15)]);
        assert_eq!(probe.api_method(), "getSlot");
    }
}
