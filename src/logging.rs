//! Logging setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false` if a
/// subscriber was already installed, in which case nothing changes.
pub fn init(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
