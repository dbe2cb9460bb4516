//! Configuration schema definitions.
//!
//! Every section carries `#[serde(default)]`, so a file only needs the keys it
//! changes.

use super::error::{ConfigError, ConfigResult};
use crate::display::{DisplaySettings, DEFAULT_MAX_LINES};
use crate::port::{ConnectionConfig, DataBits, FlowControl, Parity, StopBits};
use crate::queue::DEFAULT_INBOUND_CAPACITY;
use crate::transmit::Terminator;
use crate::worker::{
    WorkerSettings, DEFAULT_DISPLAY_WAIT, DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_POLL_INTERVAL,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Baud rate selected when nothing else is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Rates offered by the port picker; any other positive rate is accepted too.
pub const STANDARD_BAUD_RATES: [u32; 7] = [1200, 4800, 9600, 19200, 38400, 57600, 115200];

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line settings used by `:open`
    pub serial: SerialConfig,
    /// Receive view settings
    pub display: DisplayConfig,
    /// Transmit settings
    pub transmit: TransmitConfig,
    /// Worker timing and queue sizing
    pub workers: WorkersConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation(
                "serial.baud_rate",
                "must be a positive integer",
            ));
        }
        if self.display.max_lines == 0 {
            return Err(ConfigError::validation(
                "display.max_lines",
                "must be a positive integer",
            ));
        }
        if self.workers.inbound_capacity == 0 {
            return Err(ConfigError::validation(
                "workers.inbound_capacity",
                "must be a positive integer",
            ));
        }
        if self.workers.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "workers.poll_interval_ms",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Serial port section: the six connection fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port identifier, e.g. "COM3" or "/dev/ttyUSB0". Empty means "not chosen".
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl SerialConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            port_name: self.port.clone(),
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Lines kept in the receive view before the oldest are dropped
    pub max_lines: usize,
    /// Prefix each received chunk with `[HH:MM:SS.mmm]`
    pub timestamp: bool,
    /// Show received bytes escaped instead of decoded
    pub raw: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            timestamp: false,
            raw: false,
        }
    }
}

impl DisplayConfig {
    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            timestamp: self.timestamp,
            raw: self.raw,
            max_lines: self.max_lines,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmitConfig {
    pub terminator: Terminator,
}

/// Worker timing and queue sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub poll_interval_ms: u64,
    pub display_wait_ms: u64,
    pub inbound_capacity: usize,
    pub max_consecutive_errors: u32,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            display_wait_ms: DEFAULT_DISPLAY_WAIT.as_millis() as u64,
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

impl WorkersConfig {
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            display_wait: Duration::from_millis(self.display_wait_ms),
            max_consecutive_errors: self.max_consecutive_errors,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset, e.g. "info" or
    /// "serial_console=debug"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    Pretty,
    /// Compact format
    #[default]
    Compact,
}

/// Validate a max-lines edit. Accepts a positive decimal integer, surrounding
/// whitespace ignored.
pub fn parse_max_lines(input: &str) -> ConfigResult<usize> {
    match input.trim().parse::<usize>() {
        Ok(0) => Err(ConfigError::validation(
            "display.max_lines",
            "must be a positive integer",
        )),
        Ok(n) => Ok(n),
        Err(_) => Err(ConfigError::validation(
            "display.max_lines",
            format!("'{}' is not a positive integer", input.trim()),
        )),
    }
}
