// Path: crates/telemetry/src/init.rs
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initializes the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (from the node
/// configuration) is used. Returns an error when a subscriber was already
/// installed, so tests calling it repeatedly should ignore the result.
pub fn init_tracing(default_level: &str) -> Result<(), anyhow::Error> {
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
