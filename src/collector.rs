//! Collector layer.
//!
//! Two generic collector variants share one lifecycle contract: each runs an
//! unending collection loop in its own Tokio task, driven by an injected
//! probe strategy, and publishes its latest value into a
//! [`MetricHandle`](crate::metric::MetricHandle).
//!
//! - [`PollCollector`]: one request/response probe per interval
//! - [`StreamCollector`]: persistent subscription with reconnect logic
//! - [`MetricRegistry`]: maps a blockchain identity to collector definitions

mod poll;
mod registry;
mod stream;
mod traits;

pub use poll::PollCollector;
pub use registry::{
    CollectorContext, MetricDefinition, MetricRegistry, ProviderContext, RegistryError,
};
pub use stream::{StreamCollector, StreamMode};
pub use traits::{Collector, MAX_LATENCY, PollProbe, ProbeError, Sample, StreamProbe};
