//! Registry mapping blockchain identities to collector definitions.

use std::collections::HashMap;

use thiserror::Error;

use crate::collector::{Collector, ProbeError};
use crate::metric::{LabelSet, MetricConfig};

/// Errors from registry population and collector construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No definitions registered for the requested blockchain. The message
    /// enumerates every registered identity to make the typo obvious.
    #[error("no collectors registered for blockchain '{blockchain}'; registered: [{known}]")]
    UnknownBlockchain { blockchain: String, known: String },

    /// Two definitions with the same rendered metric name for one
    /// blockchain would produce ambiguous exposition lines.
    #[error("duplicate metric name '{metric_name}' registered for blockchain '{blockchain}'")]
    DuplicateMetric {
        blockchain: String,
        metric_name: String,
    },

    /// A definition factory could not build its probe.
    #[error("failed to build collector: {0}")]
    Build(#[from] ProbeError),
}

/// Identity and endpoints of one configured provider, as the engine sees it.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub name: String,
    pub blockchain: String,
    /// Region the provider serves from; becomes the `target_region` label.
    pub region: String,
    pub http_endpoint: Option<String>,
    pub ws_endpoint: Option<String>,
}

impl ProviderContext {
    /// HTTP endpoint, or a config fault for probes that need one.
    pub fn require_http(&self) -> Result<&str, ProbeError> {
        self.http_endpoint.as_deref().ok_or_else(|| {
            ProbeError::Config(format!("provider '{}' has no http_endpoint", self.name))
        })
    }

    /// WebSocket endpoint, or a config fault for probes that need one.
    pub fn require_ws(&self) -> Result<&str, ProbeError> {
        self.ws_endpoint.as_deref().ok_or_else(|| {
            ProbeError::Config(format!(
                "provider '{}' has no websocket_endpoint",
                self.name
            ))
        })
    }
}

/// Everything a definition factory needs to build one collector instance.
pub struct CollectorContext {
    pub metric_name: String,
    /// This instance's own label copy; the factory hands it to the collector.
    pub labels: LabelSet,
    pub config: MetricConfig,
    pub provider: ProviderContext,
}

type BoxedFactory =
    Box<dyn Fn(CollectorContext) -> Result<Box<dyn Collector>, RegistryError> + Send + Sync>;

/// A registered capability: a metric name plus the factory that builds a
/// collector for it. Definitions are templates, not runtime instances.
pub struct MetricDefinition {
    metric_name: String,
    factory: BoxedFactory,
}

impl MetricDefinition {
    pub fn new<F>(metric_name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(CollectorContext) -> Result<Box<dyn Collector>, RegistryError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            metric_name: metric_name.into(),
            factory: Box::new(factory),
        }
    }

    /// The rendered metric name this definition publishes under.
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }
}

impl std::fmt::Debug for MetricDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricDefinition")
            .field("metric_name", &self.metric_name)
            .finish_non_exhaustive()
    }
}

/// Mapping blockchain identity → ordered collector definitions.
///
/// Populated once at startup, before any collector is created; insertion
/// order determines the construction (and therefore exposition) order of
/// collectors sharing a provider.
#[derive(Default)]
pub struct MetricRegistry {
    chains: HashMap<String, Vec<MetricDefinition>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append definitions for a blockchain. A duplicate rendered metric
    /// name within one blockchain is rejected outright.
    pub fn register(
        &mut self,
        blockchain: impl Into<String>,
        definitions: Vec<MetricDefinition>,
    ) -> Result<(), RegistryError> {
        let blockchain = blockchain.into();
        let existing = self.chains.entry(blockchain.clone()).or_default();
        for definition in definitions {
            if existing
                .iter()
                .any(|d| d.metric_name == definition.metric_name)
            {
                return Err(RegistryError::DuplicateMetric {
                    blockchain,
                    metric_name: definition.metric_name,
                });
            }
            existing.push(definition);
        }
        Ok(())
    }

    /// Registered blockchain identities, sorted for deterministic errors.
    pub fn blockchains(&self) -> Vec<&str> {
        let mut chains: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        chains.sort_unstable();
        chains
    }

    /// Number of definitions registered for a blockchain.
    pub fn definition_count(&self, blockchain: &str) -> usize {
        self.chains.get(blockchain).map_or(0, Vec::len)
    }

    /// Instantiate one collector per registered definition for a provider.
    ///
    /// Each instance gets its own copy of the base label set built from the
    /// provider context; collectors overwrite the `api_method` dimension on
    /// construction without affecting their siblings.
    pub fn create(
        &self,
        source_region: &str,
        config: &MetricConfig,
        provider: &ProviderContext,
    ) -> Result<Vec<Box<dyn Collector>>, RegistryError> {
        let definitions = self.chains.get(&provider.blockchain).ok_or_else(|| {
            RegistryError::UnknownBlockchain {
                blockchain: provider.blockchain.clone(),
                known: self.blockchains().join(", "),
            }
        })?;

        let base_labels = LabelSet::new(
            source_region,
            &provider.region,
            &provider.blockchain,
            &provider.name,
        );

        definitions
            .iter()
            .map(|definition| {
                (definition.factory)(CollectorContext {
                    metric_name: definition.metric_name.clone(),
                    labels: base_labels.clone(),
                    config: config.clone(),
                    provider: provider.clone(),
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("blockchains", &self.blockchains())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::collector::{PollCollector, PollProbe, Sample};

    struct NoopProbe {
        method: &'static str,
    }

    #[async_trait::async_trait]
    impl PollProbe for NoopProbe {
        type Data = f64;

        async fn fetch(&self) -> Result<f64, ProbeError> {
            Ok(0.0)
        }

        fn extract(&self, data: f64) -> Result<Vec<Sample>, ProbeError> {
            Ok(vec![Sample::unnamed(data)])
        }

        fn api_method(&self) -> &str {
            self.method
        }
    }

    fn noop_definition(metric_name: &str, method: &'static str) -> MetricDefinition {
        MetricDefinition::new(metric_name, move |cx: CollectorContext| {
            Ok(Box::new(PollCollector::new(
                cx.metric_name,
                NoopProbe { method },
                cx.labels,
                cx.config,
            )) as Box<dyn Collector>)
        })
    }

    fn provider(blockchain: &str) -> ProviderContext {
        ProviderContext {
            name: "test-provider".to_string(),
            blockchain: blockchain.to_string(),
            region: "us-east".to_string(),
            http_endpoint: Some("http://localhost:8545".to_string()),
            ws_endpoint: None,
        }
    }

    fn config() -> MetricConfig {
        MetricConfig::new(Duration::from_secs(50), Duration::from_secs(60))
    }

    #[test]
    fn test_create_one_instance_per_definition() {
        let mut registry = MetricRegistry::new();
        registry
            .register(
                "Ethereum",
                vec![
                    noop_definition("response_latency_seconds", "eth_blockNumber"),
                    noop_definition("block_latency_seconds", "eth_subscribe"),
                ],
            )
            .unwrap();

        let collectors = registry
            .create("eu", &config(), &provider("Ethereum"))
            .unwrap();
        assert_eq!(collectors.len(), 2);

        // All instances share the provider-level identity dimensions but
        // carry their own api_method.
        for collector in &collectors {
            let labels = collector.handle().label_context();
            assert!(labels.contains("source_region=\"eu\""));
            assert!(labels.contains("target_region=\"us-east\""));
            assert!(labels.contains("blockchain=\"Ethereum\""));
            assert!(labels.contains("provider=\"test-provider\""));
        }
        assert!(
            collectors[0]
                .handle()
                .label_context()
                .contains("api_method=\"eth_blockNumber\"")
        );
        assert!(
            collectors[1]
                .handle()
                .label_context()
                .contains("api_method=\"eth_subscribe\"")
        );
    }

    #[test]
    fn test_unknown_blockchain_enumerates_registered() {
        let mut registry = MetricRegistry::new();
        registry
            .register(
                "Solana",
                vec![noop_definition("response_latency_seconds", "getSlot")],
            )
            .unwrap();
        registry
            .register(
                "Ethereum",
                vec![noop_definition("response_latency_seconds", "eth_gasPrice")],
            )
            .unwrap();

        let err = registry
            .create("eu", &config(), &provider("Dogecoin"))
            .map(|_| ())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Dogecoin"));
        assert!(message.contains("Ethereum, Solana"));
    }

    #[test]
    fn test_duplicate_metric_name_rejected() {
        let mut registry = MetricRegistry::new();
        registry
            .register(
                "Ton",
                vec![noop_definition("response_latency_seconds", "getConsensusBlock")],
            )
            .unwrap();

        let err = registry
            .register(
                "Ton",
                vec![noop_definition("response_latency_seconds", "getBlockHeader")],
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateMetric { .. }));

        // The failed registration must not have appended anything.
        assert_eq!(registry.definition_count("Ton"), 1);
    }

    #[test]
    fn test_same_metric_name_allowed_across_blockchains() {
        let mut registry = MetricRegistry::new();
        registry
            .register(
                "Ethereum",
                vec![noop_definition("response_latency_seconds", "eth_gasPrice")],
            )
            .unwrap();
        registry
            .register(
                "Solana",
                vec![noop_definition("response_latency_seconds", "getSlot")],
            )
            .unwrap();
        assert_eq!(registry.blockchains(), vec!["Ethereum", "Solana"]);
    }

    #[test]
    fn test_provider_context_endpoint_requirements() {
        let p = provider("Ethereum");
        assert_eq!(p.require_http().unwrap(), "http://localhost:8545");
        assert!(matches!(p.require_ws(), Err(ProbeError::Config(_))));
    }
}
