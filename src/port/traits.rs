//! Core traits for the Device Port abstraction.
//!
//! Defines the `SerialPortAdapter` trait (an open handle) and the `PortOpener`
//! trait (the factory that turns a `ConnectionConfig` into a handle), so that
//! real serial ports and mock implementations can be used interchangeably.

use super::error::PortError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration record passed to an open attempt.
///
/// Immutable once handed to [`PortOpener::open`]. Combinations the backend
/// cannot honour are rejected there, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// System path or name of the port (e.g. "/dev/ttyUSB0" or "COM3").
    pub port_name: String,

    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl ConnectionConfig {
    /// 8N1 without flow control on the given port.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} {}{}{} flow={}",
            self.port_name,
            self.baud_rate,
            self.data_bits,
            self.parity.short_code(),
            self.stop_bits,
            self.flow_control
        )
    }
}

/// Error returned when a textual setting cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}'")]
pub struct ParseSettingError {
    kind: &'static str,
    value: String,
}

impl ParseSettingError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = ParseSettingError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(ParseSettingError::new("data bits", &other.to_string())),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl FromStr for DataBits {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| ParseSettingError::new("data bits", s))
            .and_then(Self::try_from)
    }
}

impl fmt::Display for DataBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl Parity {
    /// Single-letter code used in "8N1" style summaries.
    pub fn short_code(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

impl FromStr for Parity {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Self::None),
            "even" | "e" => Ok(Self::Even),
            "odd" | "o" => Ok(Self::Odd),
            "mark" | "m" => Ok(Self::Mark),
            "space" | "s" => Ok(Self::Space),
            _ => Err(ParseSettingError::new("parity", s)),
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parity::None => "none",
            Parity::Even => "even",
            Parity::Odd => "odd",
            Parity::Mark => "mark",
            Parity::Space => "space",
        };
        f.write_str(name)
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = ParseSettingError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(ParseSettingError::new("stop bits", &other.to_string())),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl FromStr for StopBits {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map_err(|_| ParseSettingError::new("stop bits", s))
            .and_then(Self::try_from)
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowControl {
    None,
    /// XON/XOFF.
    Software,
    /// RTS/CTS handshake.
    RtsCts,
    /// DSR/DTR handshake.
    DsrDtr,
}

impl FromStr for FlowControl {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(Self::None),
            "software" | "xon_xoff" | "xonxoff" => Ok(Self::Software),
            "rts_cts" | "rtscts" | "hardware" => Ok(Self::RtsCts),
            "dsr_dtr" | "dsrdtr" => Ok(Self::DsrDtr),
            _ => Err(ParseSettingError::new("flow control", s)),
        }
    }
}

impl fmt::Display for FlowControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowControl::None => "none",
            FlowControl::Software => "software",
            FlowControl::RtsCts => "rts_cts",
            FlowControl::DsrDtr => "dsr_dtr",
        };
        f.write_str(name)
    }
}

/// An open Device Port handle.
///
/// Owned exclusively by the Communication Worker while a connection is open.
pub trait SerialPortAdapter: Send + fmt::Debug {
    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Number of bytes waiting in the receive buffer.
    fn bytes_available(&self) -> Result<usize, PortError>;

    /// Read up to `count` bytes. Never blocks longer than the port timeout.
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, PortError>;

    /// Write all of `data` to the port.
    ///
    /// Returns the number of bytes written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Push any buffered output to the device.
    fn flush(&mut self) -> Result<(), PortError> {
        Ok(())
    }

    /// Release the underlying device. Further I/O fails with `NotOpen`.
    fn close(&mut self) -> Result<(), PortError> {
        Ok(())
    }
}

/// Factory for Device Port handles.
pub trait PortOpener: Send + Sync {
    /// Acquire the device described by `config`.
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}
