// Path: crates/node/src/bin/conductor.rs
//! The `conductor` validator binary.
//!
//! Loads configuration, keys, and storage, then runs the node until
//! interrupted. The in-process hub stands in for the external transport
//! layer, which is deliberately outside the core.

use anyhow::{anyhow, Context};
use clap::Parser;
use conductor_crypto::sign::Keypair;
use conductor_network::InProcessHub;
use conductor_node::config::load_config;
use conductor_node::ValidatorNode;
use conductor_storage::ProofStore;
use conductor_telemetry::NodeMetrics;
use conductor_types::app::ValidatorSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "conductor", about = "Chorus federation validator node")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("loading configuration")?;

    conductor_telemetry::init::init_tracing(&config.monitoring.log_level)
        .context("initializing tracing")?;
    info!(target: "node", "conductor starting");

    let keypair = Keypair::load(&config.keypair_path)
        .map_err(|e| anyhow!("loading keypair from {}: {}", config.keypair_path, e))?;
    let store = ProofStore::open(&config.storage.path)
        .map_err(|e| anyhow!("opening store at {}: {}", config.storage.path, e))?;

    // The transport layer is an external collaborator; the hub is its
    // reference implementation, so a standalone binary runs a
    // single-validator network. Additional peers attach through the same
    // hub in integration setups.
    let hub = InProcessHub::new();
    let metrics = NodeMetrics::new().context("building metrics")?;
    let handle = hub.register_with_metrics(keypair.validator_id(), metrics.clone());
    let inbound = handle
        .take_inbound()
        .ok_or_else(|| anyhow!("transport inbound already taken"))?;

    let validators = match store
        .get_validator_set()
        .map_err(|e| anyhow!("reading validator set: {}", e))?
    {
        Some(set) => set,
        None => ValidatorSet::new([keypair.validator_id()]),
    };

    let node = ValidatorNode::new(
        config,
        keypair,
        validators,
        store,
        Arc::new(handle),
        metrics.handle(),
    )
    .map_err(|e| anyhow!("assembling node: {}", e))?;

    let tasks = node.start(Box::new(inbound));

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    node.shutdown();
    for task in tasks {
        let _ = task.await;
    }
    info!(target: "node", "conductor stopped");
    Ok(())
}
