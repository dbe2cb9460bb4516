//! Connection-level errors reported to the UI layer.

use crate::port::PortError;
use thiserror::Error;

/// Errors returned by the Connection Manager and the console control surface.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// `open` was called while a connection is already open.
    #[error("Port is already open. Close it before opening it again.")]
    AlreadyOpen,

    /// The operation requires an open connection.
    #[error("Operation requires an open serial port, but the port is closed.")]
    NotOpen,

    /// The Communication Worker gave up after repeated device errors. The
    /// connection stays OPEN until it is closed.
    #[error("Device stopped responding. Close and reopen the port.")]
    Faulted,

    /// The Device Port rejected the configuration or could not be acquired.
    #[error("Device error: {0}")]
    DeviceError(#[from] PortError),

    /// The worker thread could not be started.
    #[error("Failed to start worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert!(ConnectionError::AlreadyOpen
            .to_string()
            .contains("already open"));
        assert!(ConnectionError::NotOpen.to_string().contains("closed"));
        assert!(ConnectionError::Faulted.to_string().contains("reopen"));
    }

    #[test]
    fn test_port_error_converts_with_detail() {
        let err: ConnectionError = PortError::not_found("/dev/ttyUSB7").into();
        assert!(matches!(err, ConnectionError::DeviceError(PortError::NotFound(_))));
        assert!(err.to_string().contains("/dev/ttyUSB7"));
    }
}
