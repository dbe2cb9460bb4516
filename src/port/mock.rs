//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates a device without requiring actual
//! hardware, and a `MockPortOpener` that hands out clones of it. Clones share
//! state, so a test can keep one handle while the Communication Worker owns
//! another.

use super::error::PortError;
use super::traits::{ConnectionConfig, PortOpener, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Inner state of the mock port, shared between clones.
#[derive(Debug, Default)]
struct MockPortState {
    /// Bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all writes, one entry per `write_bytes` call.
    write_log: Vec<Vec<u8>>,
    /// Echo written bytes back into the read queue.
    loopback: bool,
    /// Set by `close()`, cleared by the opener on the next open.
    released: bool,
    /// Number of pending failures for availability/read/write calls.
    failures_pending: u32,
    /// Number of successful opens.
    open_count: u32,
    /// Number of `close()` calls.
    close_count: u32,
    /// Writes attempted while released.
    writes_after_release: u32,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use serial_console::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello, World!");
/// assert_eq!(port.bytes_available().unwrap(), 13);
///
/// let data = port.read_bytes(13).unwrap();
/// assert_eq!(data, b"Hello, World!");
///
/// port.write_bytes(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
        }
    }

    /// Create a mock that echoes every write back as readable bytes.
    pub fn loopback(name: impl Into<String>) -> Self {
        let port = Self::new(name);
        port.state.lock().loopback = true;
        port
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Make the next `count` availability/read/write calls fail with an I/O error.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().failures_pending = count;
    }

    /// Whether the port has been released by `close()`.
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }

    /// Number of times the opener handed this port out.
    pub fn open_count(&self) -> u32 {
        self.state.lock().open_count
    }

    /// Number of times the port was closed.
    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }

    /// Writes attempted after the port was released.
    pub fn writes_after_release(&self) -> u32 {
        self.state.lock().writes_after_release
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }

    fn take_failure(state: &mut MockPortState) -> Result<(), PortError> {
        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated device failure",
            )));
        }
        Ok(())
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.released {
            return Err(PortError::NotOpen);
        }
        Self::take_failure(&mut state)?;
        Ok(state.read_queue.len())
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, PortError> {
        let mut state = self.state.lock();
        if state.released {
            return Err(PortError::NotOpen);
        }
        Self::take_failure(&mut state)?;
        let n = count.min(state.read_queue.len());
        Ok(state.read_queue.drain(..n).collect())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.released {
            state.writes_after_release += 1;
            return Err(PortError::NotOpen);
        }
        Self::take_failure(&mut state)?;
        state.write_log.push(data.to_vec());
        if state.loopback {
            state.read_queue.extend(data);
        }
        Ok(data.len())
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.released = true;
        state.close_count += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}

/// Hands out clones of one shared [`MockSerialPort`].
#[derive(Debug, Clone)]
pub struct MockPortOpener {
    port: MockSerialPort,
    reject: Arc<Mutex<Option<String>>>,
    last_config: Arc<Mutex<Option<ConnectionConfig>>>,
}

impl MockPortOpener {
    /// Opener for the given mock port.
    pub fn new(port: MockSerialPort) -> Self {
        Self {
            port,
            reject: Arc::new(Mutex::new(None)),
            last_config: Arc::new(Mutex::new(None)),
        }
    }

    /// Make every open attempt fail with a configuration error until cleared.
    pub fn reject_with(&self, reason: Option<&str>) {
        *self.reject.lock() = reason.map(str::to_string);
    }

    /// The shared port handle.
    pub fn port(&self) -> &MockSerialPort {
        &self.port
    }

    /// Configuration of the most recent successful open.
    pub fn last_config(&self) -> Option<ConnectionConfig> {
        self.last_config.lock().clone()
    }
}

impl PortOpener for MockPortOpener {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        if let Some(reason) = self.reject.lock().clone() {
            return Err(PortError::config(reason));
        }
        if config.port_name != self.port.name {
            return Err(PortError::not_found(&config.port_name));
        }
        if config.baud_rate == 0 {
            return Err(PortError::config("baud rate must be positive"));
        }
        {
            let mut state = self.port.state.lock();
            state.released = false;
            state.open_count += 1;
        }
        *self.last_config.lock() = Some(config.clone());
        Ok(Box::new(self.port.clone()))
    }
}
