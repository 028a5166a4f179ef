//! Chainprobe - Blockchain RPC Latency Exporter
//!
//! Measures response and propagation latency of blockchain RPC providers and
//! exposes the results as text metrics, optionally pushing them to a remote
//! write endpoint.
//!
//! # Architecture
//!
//! - **Metric**: label model, per-collector configuration, and the shared
//!   value cell collectors publish into
//! - **Collector**: poll and stream collection loops, driven by per-chain
//!   probe strategies, wired up through a blockchain registry
//! - **Chains**: built-in probe definitions for EVM networks, Solana and TON
//! - **Orchestrator**: one task per collector, per-provider fault isolation,
//!   graceful shutdown
//! - **Exposition / Server / Push**: text rendering, HTTP endpoint, remote
//!   write forwarding

pub mod chains;
pub mod collector;
pub mod config;
pub mod exposition;
pub mod metric;
pub mod orchestrator;
pub mod push;
pub mod server;

pub use collector::{Collector, MetricRegistry, PollProbe, StreamProbe};
pub use metric::{LabelSet, MetricConfig, MetricHandle};
pub use orchestrator::Orchestrator;
