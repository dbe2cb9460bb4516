//! Device Port abstraction layer.
//!
//! Provides the traits the Communication Worker drives, a real implementation
//! over the `serialport` crate, and a mock for tests and the `--mock` CLI mode.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockPortOpener, MockSerialPort};
pub use sync_port::*;
pub use traits::*;
