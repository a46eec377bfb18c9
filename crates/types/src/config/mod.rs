// Path: crates/types/src/config/mod.rs
//! Shared configuration structures for the validator node.
//!
//! Loading (TOML file plus environment-variable overrides) lives in the node
//! crate; this module only defines the shape and the defaults.

use serde::{Deserialize, Serialize};

fn default_listen_address() -> String {
    "0.0.0.0:4001".to_string()
}
fn default_iterations() -> u64 {
    crate::app::DEFAULT_VDF_ITERATIONS
}
fn default_progress_interval() -> u64 {
    1_000_000
}
fn default_adjustment_interval_days() -> u32 {
    10
}
fn default_storage_path() -> String {
    "./validator_data".to_string()
}
fn default_min_validators() -> usize {
    3
}
fn default_threshold() -> f64 {
    0.67
}
fn default_timeout_seconds() -> u64 {
    120
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_keypair_path() -> String {
    "./keys/validator_key.seed".to_string()
}

/// Network-facing options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The address and port the transport listens on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Addresses of peers to dial at startup.
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            bootstrap_peers: Vec::new(),
        }
    }
}

/// VDF difficulty options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VdfConfig {
    /// Sequential hash iterations per day proof. The default targets roughly
    /// 24 hours on reference hardware.
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// How often the computation checks for cancellation and reports
    /// progress, in iterations.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    /// Recompute difficulty every this many days.
    #[serde(default = "default_adjustment_interval_days")]
    pub adjustment_interval_days: u32,
}

impl Default for VdfConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            progress_interval: default_progress_interval(),
            adjustment_interval_days: default_adjustment_interval_days(),
        }
    }
}

/// Persistent-store options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Filesystem path of the store.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Consensus tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// The minimum number of validators required before rounds start.
    #[serde(default = "default_min_validators")]
    pub min_validators: usize,
    /// Supermajority fraction. Kept for operator visibility; the engine
    /// derives its integer thresholds from the validator count.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Round timeout in seconds; also the peer-proof collection window.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            min_validators: default_min_validators(),
            threshold: default_threshold(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Observability options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Log level filter applied when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// The full node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Path to the 32-byte Ed25519 seed file.
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
    /// Network-facing options.
    #[serde(default)]
    pub network: NetworkConfig,
    /// VDF difficulty options.
    #[serde(default)]
    pub vdf: VdfConfig,
    /// Persistent-store options.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Consensus tuning options.
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Observability options.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
            network: NetworkConfig::default(),
            vdf: VdfConfig::default(),
            storage: StorageConfig::default(),
            consensus: ConsensusConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}
