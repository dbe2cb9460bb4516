//! Configuration module for serial-console.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_CONSOLE_CONFIG` environment variable (explicit path)
//! 2. `./serial-console.toml` (current directory)
//! 3. `serial-console.toml` in the platform config directory
//! 4. Built-in defaults (no file required)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_CONSOLE_<SECTION>_<KEY>`:
//! - `SERIAL_CONSOLE_SERIAL_PORT=/dev/ttyUSB0`
//! - `SERIAL_CONSOLE_SERIAL_BAUD_RATE=115200`
//! - `SERIAL_CONSOLE_DISPLAY_MAX_LINES=2048`
//! - `SERIAL_CONSOLE_TRANSMIT_TERMINATOR=lf`
//! - `SERIAL_CONSOLE_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_console::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Default baud: {}", config.serial.baud_rate);
//! # Ok::<(), serial_console::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    parse_max_lines, Config, DisplayConfig, LogFormat, LoggingConfig, SerialConfig,
    TransmitConfig, WorkersConfig, DEFAULT_BAUD_RATE, STANDARD_BAUD_RATES,
};
