// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo
    )
)]

//! # Conductor Telemetry
//!
//! Observability infrastructure for the Conductor validator node: structured
//! logging initialization, abstract metric sinks, and their `prometheus`
//! implementation.
//!
//! Metrics are node-local objects passed around by handle. Nothing in this
//! crate installs process-wide mutable state beyond the tracing subscriber.

/// The initialization routine for global structured logging.
pub mod init;
/// The concrete implementation of metric sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract sink traits that decouple instrumentation from the backend.
pub mod sinks;
/// A simple RAII timer for measuring the duration of a scope.
pub mod time;

pub use prometheus::NodeMetrics;
pub use sinks::{ConsensusMetrics, MetricsHandle, NetworkMetrics, StorageMetrics, VdfMetrics};
