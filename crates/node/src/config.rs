// Path: crates/node/src/config.rs
//! Configuration loading.
//!
//! Options come from a TOML file, then environment variables override
//! individual values. The variable name is the config path joined by
//! underscores and upper-cased, prefixed with `CONDUCTOR_`:
//! `CONDUCTOR_NETWORK_LISTEN_ADDRESS`, `CONDUCTOR_VDF_ITERATIONS`,
//! `CONDUCTOR_CONSENSUS_THRESHOLD`, and so on.

use conductor_types::config::NodeConfig;
use conductor_types::error::ConfigError;
use std::path::Path;

/// Loads configuration from an optional TOML file and the environment.
pub fn load_config(path: Option<&Path>) -> Result<NodeConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
            toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        }
        None => NodeConfig::default(),
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Applies environment overrides through a lookup function (injected so
/// tests do not mutate the process environment).
pub fn apply_env_overrides<F>(config: &mut NodeConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("CONDUCTOR_KEYPAIR_PATH") {
        config.keypair_path = value;
    }
    if let Some(value) = lookup("CONDUCTOR_NETWORK_LISTEN_ADDRESS") {
        config.network.listen_address = value;
    }
    if let Some(value) = lookup("CONDUCTOR_NETWORK_BOOTSTRAP_PEERS") {
        config.network.bootstrap_peers = value
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(value) = lookup("CONDUCTOR_VDF_ITERATIONS") {
        config.vdf.iterations = parse(&value, "vdf.iterations")?;
    }
    if let Some(value) = lookup("CONDUCTOR_VDF_ADJUSTMENT_INTERVAL_DAYS") {
        config.vdf.adjustment_interval_days = parse(&value, "vdf.adjustment_interval_days")?;
    }
    if let Some(value) = lookup("CONDUCTOR_STORAGE_PATH") {
        config.storage.path = value;
    }
    if let Some(value) = lookup("CONDUCTOR_CONSENSUS_MIN_VALIDATORS") {
        config.consensus.min_validators = parse(&value, "consensus.min_validators")?;
    }
    if let Some(value) = lookup("CONDUCTOR_CONSENSUS_THRESHOLD") {
        config.consensus.threshold = parse(&value, "consensus.threshold")?;
    }
    if let Some(value) = lookup("CONDUCTOR_CONSENSUS_TIMEOUT_SECONDS") {
        config.consensus.timeout_seconds = parse(&value, "consensus.timeout_seconds")?;
    }
    if let Some(value) = lookup("CONDUCTOR_MONITORING_LOG_LEVEL") {
        config.monitoring.log_level = value;
    }
    Ok(())
}

fn parse<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| ConfigError::Parse(format!("{}: {}", key, e)))
}

fn validate(config: &NodeConfig) -> Result<(), ConfigError> {
    if config.vdf.iterations == 0 {
        return Err(ConfigError::Invalid(
            "vdf.iterations must be positive".to_string(),
        ));
    }
    if !(0.5..=1.0).contains(&config.consensus.threshold) {
        return Err(ConfigError::Invalid(format!(
            "consensus.threshold {} outside [0.5, 1.0]",
            config.consensus.threshold
        )));
    }
    if config.consensus.min_validators == 0 {
        return Err(ConfigError::Invalid(
            "consensus.min_validators must be positive".to_string(),
        ));
    }
    if config.consensus.timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "consensus.timeout_seconds must be positive".to_string(),
        ));
    }
    Ok(())
}
