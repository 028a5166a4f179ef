//! Per-collector timing configuration.

use std::collections::BTreeMap;
use std::time::Duration;

/// Configuration shared by every collector variant.
///
/// Immutable after construction. `extra_params` carries chain-specific
/// payload data (contract call data, signed transactions, secret material)
/// that the engine treats as opaque.
#[derive(Debug, Clone)]
pub struct MetricConfig {
    /// Timeout for a single probe operation.
    pub timeout: Duration,
    /// Sleep between successful collection cycles.
    pub interval: Duration,
    /// Optional override for the sleep after a fault.
    pub retry_interval: Option<Duration>,
    /// Opaque per-provider parameters, consumed by chain strategies only.
    pub extra_params: BTreeMap<String, serde_json::Value>,
}

impl MetricConfig {
    /// Create a configuration with no retry override and no extra params.
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            retry_interval: None,
            extra_params: BTreeMap::new(),
        }
    }

    /// Set an explicit retry interval.
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = Some(retry_interval);
        self
    }

    /// Set the extra-parameter map.
    pub fn with_extra_params(mut self, extra_params: BTreeMap<String, serde_json::Value>) -> Self {
        self.extra_params = extra_params;
        self
    }

    /// Add a single extra parameter.
    pub fn with_extra_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra_params.insert(key.into(), value);
        self
    }

    /// Delay to sleep after a fault: the explicit retry override when
    /// configured, otherwise the regular collection interval.
    pub fn retry_delay(&self) -> Duration {
        self.retry_interval.unwrap_or(self.interval)
    }

    /// Look up an extra parameter.
    pub fn extra(&self, key: &str) -> Option<&serde_json::Value> {
        self.extra_params.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retry_delay_falls_back_to_interval() {
        let config = MetricConfig::new(Duration::from_secs(50), Duration::from_secs(60));
        assert_eq!(config.retry_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_delay_override() {
        let config = MetricConfig::new(Duration::from_secs(50), Duration::from_secs(60))
            .with_retry_interval(Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::from_secs(10));
    }

    #[test]
    fn test_extra_params() {
        let config = MetricConfig::new(Duration::from_secs(5), Duration::from_secs(30))
            .with_extra_param("tx_data", json!({"to": "0xabc"}));
        assert_eq!(config.extra("tx_data").unwrap()["to"], "0xabc");
        assert!(config.extra("missing").is_none());
    }
}
