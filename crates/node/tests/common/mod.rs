// Path: crates/node/tests/common/mod.rs
//! Shared scaffolding for the scenario tests: an in-process cluster of full
//! validator nodes wired over the hub transport.
#![allow(dead_code)]

use conductor_crypto::sign::Keypair;
use conductor_network::{InProcessHub, PeerExchange};
use conductor_node::ValidatorNode;
use conductor_storage::ProofStore;
use conductor_telemetry::MetricsHandle;
use conductor_types::app::{ValidatorId, ValidatorSet};
use conductor_types::config::NodeConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct Cluster {
    pub hub: InProcessHub,
    pub keypairs: Vec<Keypair>,
    pub nodes: Vec<ValidatorNode>,
    pub tasks: Vec<tokio::task::JoinHandle<()>>,
    _dirs: Vec<tempfile::TempDir>,
}

/// A configuration small enough that a "day" takes well under a second.
pub fn fast_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.vdf.iterations = 400;
    config.vdf.progress_interval = 100;
    config.consensus.timeout_seconds = 10;
    config.consensus.min_validators = 3;
    config
}

/// Spawns `n` full validator nodes sharing one hub.
pub fn spawn_cluster(n: usize, config: NodeConfig) -> Cluster {
    spawn_cluster_subset(n, n, config)
}

/// Spawns a cluster whose validator set has `total` members but where only
/// the first `running` of them run full nodes. The rest are available as
/// `cluster.keypairs[running..]` for tests that play Byzantine or silent
/// validators by hand.
pub fn spawn_cluster_subset(total: usize, running: usize, config: NodeConfig) -> Cluster {
    let keypairs: Vec<Keypair> = (0..total).map(|_| Keypair::generate()).collect();
    let set = ValidatorSet::new(keypairs.iter().map(|k| k.validator_id()));
    let hub = InProcessHub::new();

    let mut nodes = Vec::with_capacity(running);
    let mut tasks = Vec::new();
    let mut dirs = Vec::with_capacity(running);

    for keypair in &keypairs[..running] {
        let dir = tempfile::tempdir().unwrap();
        let store = ProofStore::open(dir.path().join("state.redb")).unwrap();
        let handle = hub.register(keypair.validator_id());
        let inbound = handle.take_inbound().unwrap();

        let node = ValidatorNode::new(
            config.clone(),
            keypair.clone(),
            set.clone(),
            store,
            Arc::new(handle),
            MetricsHandle::noop(),
        )
        .unwrap();
        tasks.extend(node.start(Box::new(inbound)));
        nodes.push(node);
        dirs.push(dir);
    }

    Cluster {
        hub,
        keypairs,
        nodes,
        tasks,
        _dirs: dirs,
    }
}

impl Cluster {
    /// A transport handle with a non-validator identity, used to inject
    /// messages into every node.
    pub fn injector(&self) -> impl PeerExchange {
        self.hub.register(ValidatorId([0xFE; 32]))
    }

    pub async fn shutdown(self) {
        for node in &self.nodes {
            node.shutdown();
        }
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Polls `predicate` until it returns true or `timeout` elapses.
pub async fn wait_for<F, Fut>(timeout: Duration, mut predicate: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if predicate().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
