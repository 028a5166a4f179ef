//! Collection orchestrator: instantiates collectors per provider and runs
//! them for the process lifetime.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collector::{MetricRegistry, ProviderContext, RegistryError};
use crate::config::{ProbeDefaults, Provider, Secrets};
use crate::metric::{MetricConfig, MetricHandle};

/// Grace period for collector tasks to finish after cancellation.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the registry, the spawned collector tasks, and the handle list the
/// exposition endpoint reads.
///
/// Handles are appended only during startup; once [`handles`](Self::handles)
/// freezes the list, steady-state operation never mutates it.
pub struct Orchestrator {
    registry: MetricRegistry,
    shutdown: CancellationToken,
    handles: Vec<MetricHandle>,
    tasks: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(registry: MetricRegistry) -> Self {
        Self {
            registry,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Start collectors for every provider. A provider whose collectors
    /// cannot be constructed is logged and skipped; the others proceed.
    pub fn start_providers(
        &mut self,
        providers: &[Provider],
        defaults: &ProbeDefaults,
        secrets: &Secrets,
    ) {
        for provider in providers {
            if let Err(e) = self.start_provider(provider, defaults, secrets) {
                tracing::error!(
                    provider = %provider.name,
                    blockchain = %provider.blockchain,
                    error = %e,
                    "failed to start collectors for provider"
                );
            }
        }
    }

    fn start_provider(
        &mut self,
        provider: &Provider,
        defaults: &ProbeDefaults,
        secrets: &Secrets,
    ) -> Result<(), RegistryError> {
        let config = MetricConfig::new(defaults.timeout, defaults.interval);
        let config = match defaults.retry_interval {
            Some(retry) => config.with_retry_interval(retry),
            None => config,
        };
        let config = config.with_extra_params(build_extra_params(provider, secrets));

        let context = ProviderContext {
            name: provider.name.clone(),
            blockchain: provider.blockchain.clone(),
            region: provider.region.clone(),
            http_endpoint: provider.http_endpoint.clone(),
            ws_endpoint: provider.websocket_endpoint.clone(),
        };

        let collectors = self
            .registry
            .create(&defaults.source_region, &config, &context)?;
        let count = collectors.len();

        for collector in collectors {
            self.handles.push(collector.handle());
            self.tasks
                .push(tokio::spawn(collector.run(self.shutdown.child_token())));
        }

        tracing::info!(
            provider = %provider.name,
            blockchain = %provider.blockchain,
            collectors = count,
            "collectors started"
        );
        Ok(())
    }

    /// Token cancelled when [`shutdown`](Self::shutdown) begins. Auxiliary
    /// loops (push forwarding) tie their lifetime to it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Freeze the handle list for the exposition endpoint and push loop.
    pub fn handles(&self) -> Arc<[MetricHandle]> {
        self.handles.clone().into()
    }

    /// Number of running collector tasks.
    pub fn collector_count(&self) -> usize {
        self.tasks.len()
    }

    /// Cancel every collector and wait for them to exit, bounded by
    /// [`DEFAULT_SHUTDOWN_TIMEOUT`].
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let drain = async {
            for task in self.tasks {
                if let Err(e) = task.await {
                    tracing::warn!(error = %e, "collector task panicked during shutdown");
                }
            }
        };
        if tokio::time::timeout(DEFAULT_SHUTDOWN_TIMEOUT, drain)
            .await
            .is_err()
        {
            tracing::warn!("collector shutdown timed out");
        } else {
            tracing::info!("all collectors stopped");
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("collectors", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

/// Bundle the provider's opaque payload data and its referenced secret into
/// the extra-parameter map. The engine never inspects either.
fn build_extra_params(
    provider: &Provider,
    secrets: &Secrets,
) -> BTreeMap<String, serde_json::Value> {
    let mut extra = BTreeMap::new();
    if let Some(data) = &provider.data {
        extra.insert("tx_data".to_string(), data.clone());
        if let Some(index) = data.get("secret_index").and_then(|i| i.as_u64()) {
            match secrets.get(index as usize) {
                Some(secret) => {
                    extra.insert("secret".to_string(), secret.clone());
                }
                None => {
                    tracing::warn!(
                        provider = %provider.name,
                        secret_index = index,
                        "secret index out of range, skipping"
                    );
                }
            }
        }
    }
    extra
}
