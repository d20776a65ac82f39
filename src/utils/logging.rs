// src/utils/logging.rs
use tracing_subscriber::{fmt, EnvFilter};

// chromiumoxide traces every CDP round trip below WARN.
const DEFAULT_FILTER: &str = "info,chromiumoxide=warn";

/// Sets up the logging framework using tracing_subscriber.
/// Reads log level filters from the `RUST_LOG` environment variable,
/// falling back to INFO for this crate and WARN for the CDP client.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("Logging setup complete.");
}
