//! YAML-based configuration loading and validation:
//! - Application settings (server, probe defaults, push forwarding)
//! - Provider inventory (endpoints and opaque probe payloads)
//! - Secrets referenced by providers

mod app;
mod providers;
mod secrets;
mod validation;

pub use app::{
    AppConfig, DEFAULT_INTERVAL, DEFAULT_TIMEOUT, ProbeDefaults, PushSettings, ServerConfig,
};
pub use providers::{Provider, ProvidersConfig};
pub use secrets::Secrets;
pub use validation::{ConfigError, expand_env_vars};
