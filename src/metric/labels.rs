//! Ordered label sets for metric identity and status.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Known label dimensions, rendered in snake_case.
///
/// `ApiMethod` and `ResponseStatus` are the only dimensions mutated after
/// construction; the rest identify the collector for its whole lifetime.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LabelKey {
    SourceRegion,
    TargetRegion,
    Blockchain,
    Provider,
    ApiMethod,
    ResponseStatus,
}

/// An insertion-ordered collection of `key="value"` label pairs.
///
/// Keys are unique within a set. Rendering order is insertion order, so the
/// exposition output is deterministic for a given construction sequence.
/// `LabelSet` is `Clone`; every collector instance owns its own copy, so
/// mutating one collector's labels never bleeds into a sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<(LabelKey, String)>,
}

impl LabelSet {
    /// Build the standard label set for one provider.
    ///
    /// `api_method` starts as `"default"` (each collector overwrites it with
    /// its own method on construction) and `response_status` as `"success"`.
    pub fn new(
        source_region: impl Into<String>,
        target_region: impl Into<String>,
        blockchain: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            labels: vec![
                (LabelKey::SourceRegion, source_region.into()),
                (LabelKey::TargetRegion, target_region.into()),
                (LabelKey::Blockchain, blockchain.into()),
                (LabelKey::Provider, provider.into()),
                (LabelKey::ApiMethod, "default".to_string()),
                (LabelKey::ResponseStatus, "success".to_string()),
            ],
        }
    }

    /// Get the value of a label, if present.
    pub fn get(&self, key: LabelKey) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a label value: update in place if the key exists, otherwise
    /// append it. Appending signals a key that was never declared at
    /// construction, which is worth a warning in the log.
    pub fn set(&mut self, key: LabelKey, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.labels.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            tracing::warn!(label = %key, "setting label that was never declared, appending");
            self.labels.push((key, value));
        }
    }

    /// Render as `key="value",key="value",...` in insertion order.
    pub fn render(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{k}=\"{v}\""))
            .collect::<Vec<_>>()
            .join(",")
    }
}
