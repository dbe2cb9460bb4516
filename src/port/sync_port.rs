//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `SerialPortAdapter`
//! trait so the Communication Worker can be driven by real hardware or a mock.

use super::error::PortError;
use super::traits::{ConnectionConfig, FlowControl, Parity, PortOpener, SerialPortAdapter};
use std::io::{Read, Write};
use std::time::Duration;

/// Read/write timeout handed to the driver. Reads only ask for bytes already
/// buffered, so this only bounds writes stalled by flow control.
const IO_TIMEOUT: Duration = Duration::from_millis(100);

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port, `None` once closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port with the given configuration.
    ///
    /// # Example
    /// ```no_run
    /// use serial_console::port::{ConnectionConfig, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open(&ConnectionConfig::new("/dev/ttyUSB0", 115200))?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(config: &ConnectionConfig) -> Result<Self, PortError> {
        let parity = match config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Mark | Parity::Space => {
                return Err(PortError::unsupported(format!(
                    "{} parity is not supported by this driver",
                    config.parity
                )))
            }
        };
        let flow_control = match config.flow_control {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::Software => serialport::FlowControl::Software,
            FlowControl::RtsCts => serialport::FlowControl::Hardware,
            FlowControl::DsrDtr => {
                return Err(PortError::unsupported(
                    "DSR/DTR flow control is not supported by this driver",
                ))
            }
        };
        if config.baud_rate == 0 {
            return Err(PortError::config("baud rate must be positive"));
        }

        let port_name = config.port_name.as_str();
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(config.data_bits.into())
            .flow_control(flow_control)
            .parity(parity)
            .stop_bits(config.stop_bits.into())
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice
                | serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    PortError::not_found(port_name)
                }
                serialport::ErrorKind::InvalidInput => PortError::config(e.to_string()),
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
        })
    }

    fn port(&self) -> Result<&dyn serialport::SerialPort, PortError> {
        self.port.as_deref().ok_or(PortError::NotOpen)
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        let count = self.port()?.bytes_to_read()?;
        Ok(count as usize)
    }

    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, PortError> {
        let mut buffer = vec![0u8; count];
        let n = self.port_mut()?.read(&mut buffer)?;
        buffer.truncate(n);
        Ok(buffer)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port_mut()?.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), PortError> {
        self.port_mut()?.flush().map_err(PortError::Io)
    }

    fn close(&mut self) -> Result<(), PortError> {
        // Dropping the driver handle releases the device.
        self.port.take();
        Ok(())
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// Opens real system serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(SyncSerialPort::open(config)?))
    }
}

/// Names of the serial ports currently present on the system.
pub fn list_ports() -> Result<Vec<String>, PortError> {
    let ports = serialport::available_ports()?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
