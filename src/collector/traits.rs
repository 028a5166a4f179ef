//! Probe strategy traits and the shared collector contract.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::metric::MetricHandle;

/// Sanity bound on any value treated as a latency. An extracted value above
/// this is a measurement fault, not a valid observation.
pub const MAX_LATENCY: Duration = Duration::from_secs(30);

/// Recoverable faults inside a collection loop.
///
/// None of these ever propagate above the loop boundary; they mark the
/// collector failed and schedule a retry.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Connection refused, timeout, non-success response code.
    #[error("transport fault: {0}")]
    Transport(String),

    /// Malformed response, rejected subscription.
    #[error("protocol fault: {0}")]
    Protocol(String),

    /// Extracted value exceeds the latency sanity bound.
    #[error("measured value {value}s exceeds sanity bound {bound:?}")]
    Measurement { value: f64, bound: Duration },

    /// Missing or invalid probe configuration (absent endpoint, bad
    /// payload data).
    #[error("config fault: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ProbeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}

/// One extracted observation. Collectors that report several related series
/// use distinct sub-keys; a single-series collector leaves the key unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub sub_key: Option<String>,
    pub value: f64,
}

impl Sample {
    /// A sample for the collector's single unnamed series.
    pub fn unnamed(value: f64) -> Self {
        Self {
            sub_key: None,
            value,
        }
    }

    /// A sample for a named sub-series.
    pub fn named(sub_key: impl Into<String>, value: f64) -> Self {
        Self {
            sub_key: Some(sub_key.into()),
            value,
        }
    }
}

/// Data-acquisition and value-extraction strategy for the polling variant.
///
/// `fetch` performs one full request/response probe; `extract` turns the
/// acquired data into samples. The surrounding [`PollCollector`] owns the
/// timeout, the sanity bound, publishing, and retry timing.
///
/// [`PollCollector`]: crate::collector::PollCollector
#[async_trait::async_trait]
pub trait PollProbe: Send + Sync + 'static {
    /// Raw data produced by one probe.
    type Data: Send;

    /// Acquire data from the endpoint. One request/response per call.
    async fn fetch(&self) -> Result<Self::Data, ProbeError>;

    /// Extract samples from the acquired data.
    fn extract(&self, data: Self::Data) -> Result<Vec<Sample>, ProbeError>;

    /// Value for the `api_method` label.
    fn api_method(&self) -> &str;
}

/// Strategy for the streaming variant: a persistent subscription that yields
/// items until the connection faults or the collector is cancelled.
///
/// Implementations keep per-connection state (the websocket, subscription
/// ids) inside `Conn`; the probe itself stays shareable and stateless.
#[async_trait::async_trait]
pub trait StreamProbe: Send + Sync + 'static {
    /// Connection state for one subscription session.
    type Conn: Send;
    /// One logical item received over the stream.
    type Item: Send;

    /// Establish the connection.
    async fn connect(&self) -> Result<Self::Conn, ProbeError>;

    /// Subscribe on an established connection.
    async fn subscribe(&self, conn: &mut Self::Conn) -> Result<(), ProbeError>;

    /// Wait for the next message. `Ok(None)` means the message carried no
    /// item of interest (keep listening).
    async fn next_item(&self, conn: &mut Self::Conn) -> Result<Option<Self::Item>, ProbeError>;

    /// Dedup identity of an item. A second item carrying the same key as
    /// the previous one is discarded without publishing.
    fn item_key(&self, item: &Self::Item) -> Option<String>;

    /// Extract samples from an item.
    fn extract(&self, item: Self::Item) -> Result<Vec<Sample>, ProbeError>;

    /// Tear down the subscription. Best-effort: faults here are logged and
    /// ignored by the caller.
    async fn unsubscribe(&self, conn: &mut Self::Conn) -> Result<(), ProbeError>;

    /// Close the connection. Best-effort.
    async fn close(&self, conn: Self::Conn);

    /// Value for the `api_method` label.
    fn api_method(&self) -> &str;
}

/// Object-safe contract shared by both collector variants.
///
/// `run` loops until the token is cancelled; cancellation terminates the
/// loop and is never treated as a fault.
#[async_trait::async_trait]
pub trait Collector: Send + 'static {
    /// The value surface this collector publishes into.
    fn handle(&self) -> MetricHandle;

    /// Run the collection loop until cancelled.
    async fn run(self: Box<Self>, shutdown: CancellationToken);
}

/// Reject any sample above the latency sanity bound.
pub(crate) fn check_bound(samples: &[Sample]) -> Result<(), ProbeError> {
    for sample in samples {
        if sample.value > MAX_LATENCY.as_secs_f64() {
            return Err(ProbeError::Measurement {
                value: sample.value,
                bound: MAX_LATENCY,
            });
        }
    }
    Ok(())
}
