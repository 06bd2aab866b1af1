//! Logging utilities

use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global logging system
///
/// `RUST_LOG` wins when set; otherwise `ANIMA_LOG_LEVEL` (default `info`)
/// is used. Calling this more than once is harmless.
pub fn init_logging() {
    let level = std::env::var("ANIMA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();

    if installed.is_err() {
        debug!("global subscriber already installed");
    }
}
