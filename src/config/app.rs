//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default per-request timeout (50 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(50);

/// Default collection interval (60 seconds).
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default push interval (60 seconds).
pub const DEFAULT_PUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Default push attempt count per cycle.
pub const DEFAULT_PUSH_RETRIES: u32 = 3;

/// Default delay between push attempts (10 seconds).
pub const DEFAULT_PUSH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Default push request timeout (10 seconds).
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(10);

fn default_source_region() -> String {
    "default".to_string()
}

fn default_push_interval() -> Duration {
    DEFAULT_PUSH_INTERVAL
}

fn default_push_retries() -> u32 {
    DEFAULT_PUSH_RETRIES
}

fn default_push_retry_delay() -> Duration {
    DEFAULT_PUSH_RETRY_DELAY
}

fn default_push_timeout() -> Duration {
    DEFAULT_PUSH_TIMEOUT
}

fn default_providers_path() -> String {
    "configs/providers.yaml".to_string()
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

// =============================================================================
// Probe Defaults
// =============================================================================

/// Defaults applied to every collector unless overridden per chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeDefaults {
    /// Per-request timeout (default: 50s).
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Collection interval (default: 60s).
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Delay after a failed probe; falls back to `interval` when unset.
    #[serde(with = "humantime_serde")]
    pub retry_interval: Option<Duration>,

    /// Region this exporter instance runs in.
    pub source_region: String,
}

impl Default for ProbeDefaults {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
            retry_interval: None,
            source_region: default_source_region(),
        }
    }
}

// =============================================================================
// Push Forwarding
// =============================================================================

/// Settings for pushing rendered metrics to a remote write endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    /// Remote endpoint URL.
    pub url: String,

    /// Basic-auth username. Supports `${VAR}` expansion.
    pub username: String,

    /// Basic-auth password or API key. Supports `${VAR}` expansion.
    pub api_key: String,

    /// Push interval (default: 60s).
    #[serde(default = "default_push_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Attempts per push cycle (default: 3).
    #[serde(default = "default_push_retries")]
    pub max_retries: u32,

    /// Delay between attempts (default: 10s).
    #[serde(default = "default_push_retry_delay", with = "humantime_serde")]
    pub retry_delay: Duration,

    /// Per-request timeout (default: 10s).
    #[serde(default = "default_push_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Probe defaults.
    #[serde(default)]
    pub defaults: ProbeDefaults,

    /// Path to the provider inventory file.
    #[serde(default = "default_providers_path")]
    pub providers_path: String,

    /// Path to the secrets file, if any.
    #[serde(default)]
    pub secrets_path: Option<String>,

    /// Push forwarding; omit to serve pull-only.
    #[serde(default)]
    pub push: Option<PushSettings>,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// Environment variables in the file are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&expand_env_vars(&content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::ValidationError(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server port must be non-zero".to_string(),
            ));
        }

        if self.defaults.timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "defaults.timeout must be positive".to_string(),
            ));
        }

        if self.defaults.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "defaults.interval must be positive".to_string(),
            ));
        }

        if self.defaults.source_region.is_empty() {
            return Err(ConfigError::ValidationError(
                "defaults.source_region must not be empty".to_string(),
            ));
        }

        if let Some(push) = &self.push {
            url::Url::parse(&push.url).map_err(|e| {
                ConfigError::ValidationError(format!("invalid push url '{}': {}", push.url, e))
            })?;
            if push.max_retries == 0 {
                return Err(ConfigError::ValidationError(
                    "push.max_retries must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}
