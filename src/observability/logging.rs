//! # Logging
//!
//! Tracing subscriber setup. `RUST_LOG` takes precedence over the configured
//! log level.

use crate::config::ReloaderConfig;
use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Build the env filter: `RUST_LOG` if set, otherwise `secrets_reloader=<level>`
#[must_use]
pub fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("secrets_reloader={}", log_level.to_lowercase()))
    })
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(config: &ReloaderConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(&config.log_level));
    let result = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}
