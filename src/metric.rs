//! Metric model: labels, configuration, and the shared value surface.
//!
//! - [`LabelSet`]: ordered identity/status dimensions attached to a metric
//! - [`MetricConfig`]: per-collector timing and opaque extra parameters
//! - [`MetricHandle`]: the single-writer value cell collectors publish into

mod config;
mod handle;
mod labels;

pub use config::MetricConfig;
pub use handle::{MetricHandle, ProbeStatus};
pub use labels::{LabelKey, LabelSet};
