// Path: crates/telemetry/src/prometheus.rs
//! Prometheus-backed implementation of the metric sinks.
//!
//! Each node owns its own `Registry`, so two nodes in one process (the
//! in-process cluster used by tests) never share counters.

use crate::sinks::{
    ConsensusMetrics, MetricsHandle, NetworkMetrics, StorageMetrics, VdfMetrics,
};
use prometheus::{
    CounterVec, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry,
};
use std::sync::Arc;

/// The full metric set for one validator node.
pub struct NodeMetrics {
    registry: Registry,

    consensus_rounds: CounterVec,
    consensus_duration: Histogram,
    rbc_messages: CounterVec,

    vdf_computation_duration: Histogram,
    vdf_difficulty: Gauge,
    day_number: Gauge,

    network_messages: CounterVec,
    network_dropped: IntCounter,
    peer_connections: Gauge,

    storage_operations: CounterVec,
}

impl NodeMetrics {
    /// Builds and registers the metric set on a fresh registry.
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let consensus_rounds = CounterVec::new(
            Opts::new("conductor_consensus_rounds_total", "Total consensus rounds"),
            &["status"],
        )?;
        let consensus_duration = Histogram::with_opts(
            HistogramOpts::new(
                "conductor_consensus_duration_seconds",
                "Consensus round duration in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        let rbc_messages = CounterVec::new(
            Opts::new("conductor_rbc_messages_total", "RBC messages by type"),
            &["message_type"],
        )?;
        let vdf_computation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "conductor_vdf_computation_duration_seconds",
                "VDF computation duration in seconds",
            )
            .buckets(vec![
                3600.0, 7200.0, 14400.0, 21600.0, 28800.0, 36000.0, 43200.0, 86400.0,
            ]),
        )?;
        let vdf_difficulty = Gauge::new(
            "conductor_vdf_difficulty",
            "Current VDF difficulty (iterations)",
        )?;
        let day_number = Gauge::new("conductor_day_number_current", "Current day number")?;
        let network_messages = CounterVec::new(
            Opts::new("conductor_network_messages_total", "Inbound messages by type"),
            &["message_type"],
        )?;
        let network_dropped = IntCounter::new(
            "conductor_network_dropped_total",
            "Messages shed by inbound-queue backpressure",
        )?;
        let peer_connections = Gauge::new("conductor_peer_connections", "Active peer connections")?;
        let storage_operations = CounterVec::new(
            Opts::new("conductor_storage_operations_total", "Storage operations"),
            &["operation", "status"],
        )?;

        registry.register(Box::new(consensus_rounds.clone()))?;
        registry.register(Box::new(consensus_duration.clone()))?;
        registry.register(Box::new(rbc_messages.clone()))?;
        registry.register(Box::new(vdf_computation_duration.clone()))?;
        registry.register(Box::new(vdf_difficulty.clone()))?;
        registry.register(Box::new(day_number.clone()))?;
        registry.register(Box::new(network_messages.clone()))?;
        registry.register(Box::new(network_dropped.clone()))?;
        registry.register(Box::new(peer_connections.clone()))?;
        registry.register(Box::new(storage_operations.clone()))?;

        Ok(Arc::new(Self {
            registry,
            consensus_rounds,
            consensus_duration,
            rbc_messages,
            vdf_computation_duration,
            vdf_difficulty,
            day_number,
            network_messages,
            network_dropped,
            peer_connections,
            storage_operations,
        }))
    }

    /// The node's registry, for exposition by an external surface.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Wraps this metric set into the sink-handle bundle.
    pub fn handle(self: &Arc<Self>) -> MetricsHandle {
        MetricsHandle {
            consensus: self.clone(),
            vdf: self.clone(),
            network: self.clone(),
            storage: self.clone(),
        }
    }
}

impl ConsensusMetrics for NodeMetrics {
    fn inc_round(&self, status: &str) {
        self.consensus_rounds.with_label_values(&[status]).inc();
    }
    fn observe_round_seconds(&self, seconds: f64) {
        self.consensus_duration.observe(seconds);
    }
    fn inc_rbc_message(&self, kind: &str) {
        self.rbc_messages.with_label_values(&[kind]).inc();
    }
}

impl VdfMetrics for NodeMetrics {
    fn observe_computation_seconds(&self, seconds: f64) {
        self.vdf_computation_duration.observe(seconds);
    }
    fn set_difficulty(&self, iterations: u64) {
        self.vdf_difficulty.set(iterations as f64);
    }
    fn set_current_day(&self, day: u32) {
        self.day_number.set(day as f64);
    }
}

impl NetworkMetrics for NodeMetrics {
    fn inc_message(&self, kind: &str) {
        self.network_messages.with_label_values(&[kind]).inc();
    }
    fn inc_dropped(&self) {
        self.network_dropped.inc();
    }
    fn set_peer_count(&self, peers: usize) {
        self.peer_connections.set(peers as f64);
    }
}

impl StorageMetrics for NodeMetrics {
    fn inc_op(&self, op: &str, status: &str) {
        self.storage_operations
            .with_label_values(&[op, status])
            .inc();
    }
}
