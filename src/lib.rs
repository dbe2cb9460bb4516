//! Serial Console Library
//!
//! A concurrent serial terminal core: a Communication Worker that owns the
//! device while a connection is open, a Display Worker that renders received
//! data, and the queues, formatting, history and connection lifecycle that
//! tie them together.
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `connection`: Open/close state machine around the Device Port
//! - `console`: The control surface used by the UI layer
//! - `display`: Display Surface contract and line-capped rendering
//! - `error`: Connection-level errors
//! - `format`: Received-data formatting (text, raw, timestamps)
//! - `history`: Move-to-front transmit history
//! - `logging`: `tracing` subscriber setup
//! - `port`: Port abstraction layer for serial communication
//! - `queue`: Inbound and Outbound queues
//! - `transmit`: Line terminators and outbound payload encoding
//! - `worker`: Communication and Display worker threads

pub mod config;
pub mod connection;
pub mod console;
pub mod display;
pub mod error;
pub mod format;
pub mod history;
pub mod logging;
pub mod port;
pub mod queue;
pub mod transmit;
pub mod worker;

// Re-export commonly used types for convenience
pub use connection::{ConnectionManager, ConnectionState};
pub use console::{Console, ConsoleOptions};
pub use display::{BufferSurface, DisplaySettings, DisplaySurface, TerminalSurface};
pub use error::{ConnectionError, ConnectionResult};
pub use history::{History, HistorySurface};
pub use port::{
    ConnectionConfig, DataBits, FlowControl, MockPortOpener, MockSerialPort, Parity, PortError,
    PortOpener, SerialPortAdapter, StopBits, SyncSerialPort, SystemPortOpener,
};
pub use transmit::Terminator;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
