//! Streaming collector: persistent subscription with reconnect logic.

use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::collector::traits::check_bound;
use crate::collector::{Collector, ProbeError, StreamProbe};
use crate::metric::{LabelKey, LabelSet, MetricConfig, MetricHandle};

/// How a streaming collector consumes its subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Stay subscribed and publish every non-duplicate item.
    Continuous,
    /// Publish one item per session, then tear down and sleep the interval
    /// before reconnecting.
    PerInterval,
}

/// Why a subscription session ended without a fault.
enum SessionEnd {
    /// Per-interval session published its item.
    Completed,
    /// Shutdown was requested.
    Cancelled,
}

/// Generic streaming collector driven by a [`StreamProbe`] strategy.
///
/// Lifecycle: connect → subscribe → listen, publishing extracted samples.
/// Repeated notifications of the same logical item (same dedup key as the
/// previous one) are discarded without publishing. Any fault marks the
/// metric failed, tears the session down best-effort, and reconnects after
/// the retry delay. Cancellation also runs the best-effort teardown.
pub struct StreamCollector<S: StreamProbe> {
    probe: S,
    handle: MetricHandle,
    config: MetricConfig,
    mode: StreamMode,
}

impl<S: StreamProbe> StreamCollector<S> {
    /// Create a collector publishing under `metric_name`.
    ///
    /// The collector takes its own copy of `labels` and overwrites the
    /// `api_method` dimension with the probe's method.
    pub fn new(
        metric_name: impl Into<String>,
        probe: S,
        labels: LabelSet,
        config: MetricConfig,
        mode: StreamMode,
    ) -> Self {
        let mut labels = labels;
        labels.set(LabelKey::ApiMethod, probe.api_method());
        Self {
            handle: MetricHandle::new(metric_name, labels),
            probe,
            config,
            mode,
        }
    }

    /// One subscription session: connect, subscribe, listen, teardown.
    ///
    /// Dedup state lives in `last_key` and survives reconnects, so the same
    /// item re-delivered across a reconnect is still discarded.
    async fn session(
        &self,
        last_key: &mut Option<String>,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, ProbeError> {
        let mut conn = tokio::select! {
            _ = shutdown.cancelled() => return Ok(SessionEnd::Cancelled),
            connected = timeout(self.config.timeout, self.probe.connect()) => {
                connected.map_err(|_| {
                    ProbeError::Transport(format!(
                        "connect timed out after {:?}",
                        self.config.timeout
                    ))
                })??
            }
        };

        let result = self.drive(&mut conn, last_key, shutdown).await;

        // Best-effort teardown runs on fault and on cancellation alike;
        // secondary faults are logged and ignored.
        match timeout(self.config.timeout, self.probe.unsubscribe(&mut conn)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(
                    metric = %self.handle.metric_name(),
                    error = %e,
                    "best-effort unsubscribe failed"
                );
            }
            Err(_) => {
                tracing::debug!(
                    metric = %self.handle.metric_name(),
                    "best-effort unsubscribe timed out"
                );
            }
        }
        self.probe.close(conn).await;

        result
    }

    async fn drive(
        &self,
        conn: &mut S::Conn,
        last_key: &mut Option<String>,
        shutdown: &CancellationToken,
    ) -> Result<SessionEnd, ProbeError> {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(SessionEnd::Cancelled),
            subscribed = timeout(self.config.timeout, self.probe.subscribe(conn)) => {
                subscribed.map_err(|_| {
                    ProbeError::Transport(format!(
                        "subscribe timed out after {:?}",
                        self.config.timeout
                    ))
                })??;
            }
        }

        loop {
            let item = tokio::select! {
                _ = shutdown.cancelled() => return Ok(SessionEnd::Cancelled),
                received = self.probe.next_item(conn) => received?,
            };
            let Some(item) = item else { continue };

            if let Some(key) = self.probe.item_key(&item) {
                if last_key.as_deref() == Some(key.as_str()) {
                    tracing::debug!(
                        metric = %self.handle.metric_name(),
                        key = %key,
                        "duplicate item discarded"
                    );
                    continue;
                }
                *last_key = Some(key);
            }

            let samples = self.probe.extract(item)?;
            check_bound(&samples)?;
            self.handle.publish(samples);
            tracing::debug!(
                metric = %self.handle.metric_name(),
                labels = %self.handle.label_context(),
                "stream item published"
            );

            if self.mode == StreamMode::PerInterval {
                return Ok(SessionEnd::Completed);
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: StreamProbe> Collector for StreamCollector<S> {
    fn handle(&self) -> MetricHandle {
        self.handle.clone()
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) {
        let mut last_key = None;
        loop {
            let delay = match self.session(&mut last_key, &shutdown).await {
                Ok(SessionEnd::Cancelled) => break,
                Ok(SessionEnd::Completed) => self.config.interval,
                Err(e) => {
                    self.handle.mark_failed();
                    tracing::warn!(
                        metric = %self.handle.metric_name(),
                        labels = %self.handle.label_context(),
                        error = %e,
                        "stream session failed, reconnecting"
                    );
                    self.config.retry_delay()
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }

        tracing::debug!(metric = %self.handle.metric_name(), "stream collector cancelled");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::collector::Sample;
    use crate::metric::ProbeStatus;

    #[derive(Default)]
    struct Counters {
        connects: AtomicUsize,
        publishes: AtomicUsize,
        unsubscribes: AtomicUsize,
        closes: AtomicUsize,
    }

    /// Probe replaying a scripted list of (dedup key, value) items. Once the
    /// script is exhausted, `next_item` blocks forever.
    struct ScriptedStream {
        items: std::sync::Mutex<VecDeque<(String, f64)>>,
        failing_connects: AtomicUsize,
        counters: Arc<Counters>,
    }

    impl ScriptedStream {
        fn new(items: Vec<(&str, f64)>) -> (Self, Arc<Counters>) {
            let counters = Arc::new(Counters::default());
            (
                Self {
                    items: std::sync::Mutex::new(
                        items
                            .into_iter()
                            .map(|(k, v)| (k.to_string(), v))
                            .collect(),
                    ),
                    failing_connects: AtomicUsize::new(0),
                    counters: Arc::clone(&counters),
                },
                counters,
            )
        }

        fn fail_connects(self, n: usize) -> Self {
            self.failing_connects.store(n, Ordering::SeqCst);
            self
        }
    }

    #[async_trait::async_trait]
    impl StreamProbe for ScriptedStream {
        type Conn = ();
        type Item = (String, f64);

        async fn connect(&self) -> Result<(), ProbeError> {
            self.counters.connects.fetch_add(1, Ordering::SeqCst);
            if self.failing_connects.load(Ordering::SeqCst) > 0 {
                self.failing_connects.fetch_sub(1, Ordering::SeqCst);
                return Err(ProbeError::Transport("connection refused".to_string()));
            }
            Ok(())
        }

        async fn subscribe(&self, _conn: &mut ()) -> Result<(), ProbeError> {
            Ok(())
        }

        async fn next_item(&self, _conn: &mut ()) -> Result<Option<(String, f64)>, ProbeError> {
            let next = self.items.lock().unwrap().pop_front();
            match next {
                Some(item) => Ok(Some(item)),
                None => std::future::pending().await,
            }
        }

        fn item_key(&self, item: &(String, f64)) -> Option<String> {
            Some(item.0.clone())
        }

        fn extract(&self, item: (String, f64)) -> Result<Vec<Sample>, ProbeError> {
            self.counters.publishes.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Sample::unnamed(item.1)])
        }

        async fn unsubscribe(&self, _conn: &mut ()) -> Result<(), ProbeError> {
            self.counters.unsubscribes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self, _conn: ()) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn api_method(&self) -> &str {
            "testSubscribe"
        }
    }

    fn collector(probe: ScriptedStream, mode: StreamMode) -> StreamCollector<ScriptedStream> {
        let config = MetricConfig::new(Duration::from_secs(10), Duration::from_secs(60));
        let labels = LabelSet::new("eu", "us", "Solana", "test");
        StreamCollector::new("block_latency_seconds", probe, labels, config, mode)
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_items_are_discarded() {
        let (probe, counters) =
            ScriptedStream::new(vec![("A", 0.5), ("A", 0.6), ("B", 0.7)]);
        let c = collector(probe, StreamMode::Continuous);
        let handle = c.handle();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Box::new(c).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        // [A, A, B]: exactly two publishes, the duplicate A is dropped.
        assert_eq!(counters.publishes.load(Ordering::SeqCst), 2);
        assert_eq!(handle.latest_value(None), Some(0.7));
        assert_eq!(handle.status(), ProbeStatus::Success);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_interval_mode_reconnects_each_cycle() {
        let (probe, counters) = ScriptedStream::new(vec![("A", 0.1), ("B", 0.2)]);
        let c = collector(probe, StreamMode::PerInterval);
        let handle = c.handle();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Box::new(c).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counters.publishes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.unsubscribes.load(Ordering::SeqCst), 1);
        assert_eq!(handle.latest_value(None), Some(0.1));

        // Second session starts after the interval and publishes the next item.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(counters.publishes.load(Ordering::SeqCst), 2);
        assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
        assert_eq!(handle.latest_value(None), Some(0.2));

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_fault_marks_failed_and_retries() {
        let (probe, counters) = ScriptedStream::new(vec![("A", 0.3)]);
        let probe = probe.fail_connects(1);
        let c = collector(probe, StreamMode::Continuous);
        let handle = c.handle();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Box::new(c).run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.status(), ProbeStatus::Failed);

        // After the retry delay the reconnect succeeds and publishes.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(handle.status(), ProbeStatus::Success);
        assert_eq!(handle.latest_value(None), Some(0.3));
        assert!(counters.connects.load(Ordering::SeqCst) >= 2);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_runs_best_effort_teardown() {
        let (probe, counters) = ScriptedStream::new(vec![("A", 0.1)]);
        let c = collector(probe, StreamMode::Continuous);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Box::new(c).run(shutdown.clone()));

        // Collector is idle in LISTEN when the shutdown arrives.
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.cancel();
        task.await.unwrap();

        assert_eq!(counters.unsubscribes.load(Ordering::SeqCst), 1);
        assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
    }
}
