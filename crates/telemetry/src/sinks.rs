// Path: crates/telemetry/src/sinks.rs
//! Abstract metric sinks.
//!
//! Subsystems instrument against these traits; the node wires in the
//! prometheus implementation (or leaves the no-op default in tests). Keeping
//! the traits here lets the consensus and network crates record metrics
//! without depending on the backend.

use std::sync::Arc;

/// Consensus round accounting.
pub trait ConsensusMetrics: Send + Sync {
    /// Counts a finished consensus round: `status` is `success`, `failure`,
    /// or `timeout`.
    fn inc_round(&self, status: &str);
    /// Records a round's wall-clock duration.
    fn observe_round_seconds(&self, seconds: f64);
    /// Counts an RBC message by type (`rbc_propose`, `ready`, ...).
    fn inc_rbc_message(&self, kind: &str);
}

/// VDF pipeline accounting.
pub trait VdfMetrics: Send + Sync {
    /// Records one day-proof computation's wall-clock duration.
    fn observe_computation_seconds(&self, seconds: f64);
    /// Publishes the current iteration count.
    fn set_difficulty(&self, iterations: u64);
    /// Publishes the current day number.
    fn set_current_day(&self, day: u32);
}

/// Peer-exchange accounting.
pub trait NetworkMetrics: Send + Sync {
    /// Counts an inbound message by type.
    fn inc_message(&self, kind: &str);
    /// Counts a message shed by inbound-queue backpressure.
    fn inc_dropped(&self);
    /// Publishes the connected peer count.
    fn set_peer_count(&self, peers: usize);
}

/// Store accounting.
pub trait StorageMetrics: Send + Sync {
    /// Counts a storage operation: `op` is `read`/`write`, `status` is
    /// `success`/`failure`.
    fn inc_op(&self, op: &str, status: &str);
}

/// A bundle of sink handles handed to the node's subsystems.
#[derive(Clone)]
pub struct MetricsHandle {
    /// Consensus round accounting.
    pub consensus: Arc<dyn ConsensusMetrics>,
    /// VDF pipeline accounting.
    pub vdf: Arc<dyn VdfMetrics>,
    /// Peer-exchange accounting.
    pub network: Arc<dyn NetworkMetrics>,
    /// Store accounting.
    pub storage: Arc<dyn StorageMetrics>,
}

/// A sink that discards everything. The default for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl ConsensusMetrics for NoopMetrics {
    fn inc_round(&self, _status: &str) {}
    fn observe_round_seconds(&self, _seconds: f64) {}
    fn inc_rbc_message(&self, _kind: &str) {}
}

impl VdfMetrics for NoopMetrics {
    fn observe_computation_seconds(&self, _seconds: f64) {}
    fn set_difficulty(&self, _iterations: u64) {}
    fn set_current_day(&self, _day: u32) {}
}

impl NetworkMetrics for NoopMetrics {
    fn inc_message(&self, _kind: &str) {}
    fn inc_dropped(&self) {}
    fn set_peer_count(&self, _peers: usize) {}
}

impl StorageMetrics for NoopMetrics {
    fn inc_op(&self, _op: &str, _status: &str) {}
}

impl MetricsHandle {
    /// A handle whose sinks discard everything.
    pub fn noop() -> Self {
        let sink = Arc::new(NoopMetrics);
        Self {
            consensus: sink.clone(),
            vdf: sink.clone(),
            network: sink.clone(),
            storage: sink,
        }
    }
}

impl Default for MetricsHandle {
    fn default() -> Self {
        Self::noop()
    }
}
