//! Provider inventory: the RPC endpoints probed by this exporter.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_env_vars};

/// One monitored RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    /// Provider name, unique across the inventory.
    pub name: String,

    /// Blockchain this endpoint serves, matched against registry keys.
    pub blockchain: String,

    /// Region the endpoint is hosted in.
    pub region: String,

    /// WebSocket endpoint for streaming probes.
    #[serde(default)]
    pub websocket_endpoint: Option<String>,

    /// HTTP endpoint for poll probes.
    #[serde(default)]
    pub http_endpoint: Option<String>,

    /// Opaque payload passed through to chain probes (call data, secret
    /// references). Never inspected by the engine.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

/// The full provider inventory file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub providers: Vec<Provider>,
}

impl ProvidersConfig {
    /// Load the provider inventory from a YAML file.
    ///
    /// Environment variables in the file are expanded before parsing, so
    /// endpoint URLs may embed API keys via `${VAR}`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&expand_env_vars(&content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the inventory.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any provider is invalid or
    /// two providers share a name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for provider in &self.providers {
            provider.validate()?;
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate provider name: '{}'",
                    provider.name
                )));
            }
        }
        Ok(())
    }
}

impl Provider {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "provider name must not be empty".to_string(),
            ));
        }
        if self.blockchain.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "provider '{}' has no blockchain",
                self.name
            )));
        }
        if self.region.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "provider '{}' has no region",
                self.name
            )));
        }
        if self.websocket_endpoint.is_none() && self.http_endpoint.is_none() {
            return Err(ConfigError::ValidationError(format!(
                "provider '{}' has no endpoints",
                self.name
            )));
        }
        for endpoint in [&self.websocket_endpoint, &self.http_endpoint]
            .into_iter()
            .flatten()
        {
            url::Url::parse(endpoint).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "provider '{}' endpoint '{}' is not a valid URL: {}",
                    self.name, endpoint, e
                ))
            })?;
        }
        Ok(())
    }
}
