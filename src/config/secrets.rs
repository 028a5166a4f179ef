//! Secrets referenced by provider payloads via `secret_index`.

use std::path::Path;

use serde::Deserialize;

use super::validation::{ConfigError, expand_env_vars};

/// Indexed list of secret values. Providers reference entries by position,
/// keeping the values themselves out of the provider inventory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    secrets: Vec<serde_json::Value>,
}

impl Secrets {
    /// Load secrets from a YAML file, expanding environment variables first.
    ///
    /// Expansion happens before YAML parsing, so an unquoted `${VAR}` scalar
    /// takes whatever type the expanded text parses as. Quote values that
    /// must stay strings (hex material in particular).
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&expand_env_vars(&content))?)
    }

    pub fn get(&self, index: usize) -> Option<&serde_json::Value> {
        self.secrets.get(index)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}
