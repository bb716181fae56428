// ABOUTME: Tracing subscriber setup for hosts embedding the coordinator.
// ABOUTME: RUST_LOG takes precedence over the configured filter.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a global fmt subscriber.
///
/// Returns false if a subscriber was already installed; the existing one is
/// kept.
pub fn init(config: &LoggingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
