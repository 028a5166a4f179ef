//! Shared value surface between a collector and the exposition renderer.

use std::sync::{Arc, RwLock};

use crate::collector::Sample;
use crate::metric::{LabelKey, LabelSet};

/// Collection status of a metric instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// No collection cycle has completed yet.
    Pending,
    /// The most recent cycle published a value.
    Success,
    /// The most recent cycle faulted; the last published value (if any)
    /// stays exposed.
    Failed,
}

struct MetricState {
    labels: LabelSet,
    status: ProbeStatus,
    // Keyed sub-values in first-publish order. A collector that reports a
    // single series uses a `None` sub-key.
    samples: Vec<(Option<String>, f64)>,
}

/// Cheaply cloneable handle to one collector's latest published values.
///
/// The owning collector loop is the only writer; the exposition renderer and
/// the push forwarder read concurrently. The lock is never held across an
/// await point.
#[derive(Clone)]
pub struct MetricHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    metric_name: String,
    state: RwLock<MetricState>,
}

impl MetricHandle {
    /// Create a handle with no published values. The collector owns its own
    /// copy of `labels`.
    pub fn new(metric_name: impl Into<String>, labels: LabelSet) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                metric_name: metric_name.into(),
                state: RwLock::new(MetricState {
                    labels,
                    status: ProbeStatus::Pending,
                    samples: Vec::new(),
                }),
            }),
        }
    }

    /// The rendered metric name this handle exposes.
    pub fn metric_name(&self) -> &str {
        &self.inner.metric_name
    }

    /// Publish a successful collection: upsert each sample by sub-key and
    /// flip the status (and status label) to success.
    pub fn publish(&self, samples: Vec<Sample>) {
        let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
        for sample in samples {
            match state
                .samples
                .iter_mut()
                .find(|(key, _)| *key == sample.sub_key)
            {
                Some(slot) => slot.1 = sample.value,
                None => state.samples.push((sample.sub_key, sample.value)),
            }
        }
        state.status = ProbeStatus::Success;
        state.labels.set(LabelKey::ResponseStatus, "success");
    }

    /// Record a fault: the status flips to failed but previously published
    /// values are left untouched.
    pub fn mark_failed(&self) {
        let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
        state.status = ProbeStatus::Failed;
        state.labels.set(LabelKey::ResponseStatus, "failed");
    }

    /// Update a mutable label (api method or response status).
    pub fn set_label(&self, key: LabelKey, value: impl Into<String>) {
        let mut state = self.inner.state.write().unwrap_or_else(|e| e.into_inner());
        state.labels.set(key, value);
    }

    /// Current collection status.
    pub fn status(&self) -> ProbeStatus {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .status
    }

    /// Latest value for a sub-key (`None` for the unnamed series).
    pub fn latest_value(&self, sub_key: Option<&str>) -> Option<f64> {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .samples
            .iter()
            .find(|(key, _)| key.as_deref() == sub_key)
            .map(|(_, v)| *v)
    }

    /// Rendered label context, used for fault diagnostics.
    pub fn label_context(&self) -> String {
        self.inner
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .labels
            .render()
    }

    /// Append one exposition line per published sample to `out`.
    ///
    /// Emits nothing until the first successful publish.
    pub fn render_into(&self, out: &mut Vec<String>) {
        let state = self.inner.state.read().unwrap_or_else(|e| e.into_inner());
        let labels = state.labels.render();
        for (sub_key, value) in &state.samples {
            let name = match sub_key {
                Some(key) => format!("{}_{}", self.inner.metric_name, key),
                None => self.inner.metric_name.clone(),
            };
            out.push(format!("{name}{{{labels}}} {value}"));
        }
    }
}

impl std::fmt::Debug for MetricHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricHandle")
            .field("metric_name", &self.inner.metric_name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle() -> MetricHandle {
        MetricHandle::new(
            "response_latency_seconds",
            LabelSet::new("eu", "us", "Ethereum", "alchemy"),
        )
    }

    #[test]
    fn test_pending_handle_renders_nothing() {
        let handle = test_handle();
        let mut out = Vec::new();
        handle.render_into(&mut out);
        assert!(out.is_empty());
        assert_eq!(handle.status(), ProbeStatus::Pending);
    }

    #[test]
    fn test_publish_unnamed_sample() {
        let handle = test_handle();
        handle.publish(vec![Sample::unnamed(0.15)]);

        assert_eq!(handle.status(), ProbeStatus::Success);
        assert_eq!(handle.latest_value(None), Some(0.15));

        let mut out = Vec::new();
        handle.render_into(&mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("response_latency_seconds{"));
        assert!(out[0].ends_with("} 0.15"));
        assert!(out[0].contains("response_status=\"success\""));
    }

    #[test]
    fn test_publish_named_sub_values() {
        let handle = test_handle();
        handle.publish(vec![Sample::named("p50", 0.1), Sample::named("p99", 0.4)]);

        let mut out = Vec::new();
        handle.render_into(&mut out);
        assert_eq!(out.len(), 2);
        assert!(out[0].starts_with("response_latency_seconds_p50{"));
        assert!(out[1].starts_with("response_latency_seconds_p99{"));
    }

    #[test]
    fn test_failure_keeps_last_value() {
        let handle = test_handle();
        handle.publish(vec![Sample::unnamed(0.2)]);
        handle.mark_failed();

        assert_eq!(handle.status(), ProbeStatus::Failed);
        assert_eq!(handle.latest_value(None), Some(0.2));

        let mut out = Vec::new();
        handle.render_into(&mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("response_status=\"failed\""));
        assert!(out[0].ends_with("} 0.2"));
    }

    #[test]
    fn test_publish_overwrites_by_sub_key() {
        let handle = test_handle();
        handle.publish(vec![Sample::unnamed(0.2)]);
        handle.publish(vec![Sample::unnamed(0.3)]);

        assert_eq!(handle.latest_value(None), Some(0.3));
        let mut out = Vec::new();
        handle.render_into(&mut out);
        assert_eq!(out.len(), 1);
    }
}
