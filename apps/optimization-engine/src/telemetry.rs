//! Tracing subscriber setup.
//!
//! `RUST_LOG` overrides the configured level. Output is JSON unless the
//! configured format is `pretty`.
//!
//! ```rust,ignore
//! use optimization_engine::{config::load_config, telemetry::init_tracing};
//!
//! let config = load_config(None)?;
//! init_tracing(&config.logging);
//! ```

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns `false` when a subscriber was already installed; the existing one
/// stays in place.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = env_filter(config);
    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(config.include_spans)
            .with_span_list(config.include_spans)
            .try_init()
            .is_ok(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::info!(level = %config.level, format = ?config.format, "Tracing initialized");
    }
    installed
}
