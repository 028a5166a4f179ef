//! Polling collector: one request/response probe per interval.

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::collector::traits::check_bound;
use crate::collector::{Collector, PollProbe, ProbeError, Sample};
use crate::metric::{LabelKey, LabelSet, MetricConfig, MetricHandle};

/// Generic polling collector driven by a [`PollProbe`] strategy.
///
/// Lifecycle: fetch → extract → bound check → publish → sleep(interval),
/// looping forever. Any fault marks the metric failed, logs the full label
/// context, and retries after the configured retry delay. A fault never
/// overwrites the last published value.
pub struct PollCollector<P: PollProbe> {
    probe: P,
    handle: MetricHandle,
    config: MetricConfig,
}

impl<P: PollProbe> PollCollector<P> {
    /// Create a collector publishing under `metric_name`.
    ///
    /// The collector takes its own copy of `labels` and overwrites the
    /// `api_method` dimension with the probe's method.
    pub fn new(metric_name: impl Into<String>, probe: P, labels: LabelSet, config: MetricConfig) -> Self {
        let mut labels = labels;
        labels.set(LabelKey::ApiMethod, probe.api_method());
        Self {
            handle: MetricHandle::new(metric_name, labels),
            probe,
            config,
        }
    }

    /// One full probe: acquisition under the configured timeout, then
    /// extraction and the latency sanity check.
    async fn probe_once(&self) -> Result<Vec<Sample>, ProbeError> {
        let data = timeout(self.config.timeout, self.probe.fetch())
            .await
            .map_err(|_| {
                ProbeError::Transport(format!("probe timed out after {:?}", self.config.timeout))
            })??;
        let samples = self.probe.extract(data)?;
        check_bound(&samples)?;
        Ok(samples)
    }
}

#[async_trait::async_trait]
impl<P: PollProbe> Collector for PollCollector<P> {
    fn handle(&self) -> MetricHandle {
        self.handle.clone()
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) {
        loop {
            let outcome = tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.probe_once() => result,
            };

            let delay = match outcome {
                Ok(samples) => {
                    tracing::debug!(
                        metric = %self.handle.metric_name(),
                        labels = %self.handle.label_context(),
                        "probe succeeded"
                    );
                    self.handle.publish(samples);
                    self.config.interval
                }
                Err(e) => {
                    self.handle.mark_failed();
                    tracing::warn!(
                        metric = %self.handle.metric_name(),
                        labels = %self.handle.label_context(),
                        error = %e,
                        "probe failed, retrying"
                    );
                    self.config.retry_delay()
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        tracing::debug!(metric = %self.handle.metric_name(), "poll collector cancelled");
    }
}
