//! Diagnostic logging setup.
//!
//! Logs go to stderr so they never interleave with received data on stdout.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins, then the configured level, then `warn`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    let filter = env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_names(true)
                    .json(),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .pretty(),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_thread_names(true)
                    .compact(),
            )
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_level_used_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "serial_console=debug".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).to_string(), "serial_console=debug");
    }

    #[test]
    #[serial]
    fn test_bad_level_falls_back_to_warn() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "serial_console=loud".to_string(),
            ..LoggingConfig::default()
        };
        assert_eq!(env_filter(&config).to_string(), "warn");
    }
}
