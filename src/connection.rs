//! Connection Manager: the open/close state machine around the Device Port.
//!
//! ```text
//! CLOSED --open(ok)--> OPEN --close--> CLOSED
//! OPEN   --open------> error AlreadyOpen (no transition)
//! CLOSED --close-----> no-op
//! ```
//!
//! While OPEN exactly one Communication Worker is alive and it alone touches
//! the Device Port. `close` signals the worker, joins it, and only then
//! releases the port.

use crate::error::{ConnectionError, ConnectionResult};
use crate::port::{ConnectionConfig, PortOpener};
use crate::queue::{InboundSender, OutboundReceiver};
use crate::worker::{CommunicationWorker, StatsSnapshot, WorkerSettings};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Whether a connection is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Closed,
    Open,
}

#[derive(Debug)]
struct ActiveLink {
    config: ConnectionConfig,
    worker: CommunicationWorker,
}

/// Orchestrates Communication Worker start/stop around Device Port open/close.
pub struct ConnectionManager<O: PortOpener> {
    opener: O,
    inbound: InboundSender,
    outbound: OutboundReceiver,
    settings: WorkerSettings,
    link: Mutex<Option<ActiveLink>>,
}

impl<O: PortOpener> ConnectionManager<O> {
    pub fn new(
        opener: O,
        inbound: InboundSender,
        outbound: OutboundReceiver,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            opener,
            inbound,
            outbound,
            settings,
            link: Mutex::new(None),
        }
    }

    /// Acquire the device and start the Communication Worker.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::AlreadyOpen` if a connection is already open
    /// - `ConnectionError::DeviceError` if the device rejects the
    ///   configuration or cannot be acquired
    /// - `ConnectionError::Spawn` if the worker thread cannot be started
    ///
    /// On any error the manager stays CLOSED.
    pub fn open(&self, config: ConnectionConfig) -> ConnectionResult<()> {
        let mut link = self.link.lock();
        if link.is_some() {
            return Err(ConnectionError::AlreadyOpen);
        }

        let port = self.opener.open(&config).map_err(|e| {
            warn!(config = %config, error = %e, "failed to open device");
            ConnectionError::DeviceError(e)
        })?;

        let worker = CommunicationWorker::spawn(
            port,
            self.inbound.clone(),
            self.outbound.clone(),
            self.settings,
        )
        .map_err(ConnectionError::Spawn)?;

        info!(config = %config, "connection opened");
        *link = Some(ActiveLink { config, worker });
        Ok(())
    }

    /// Stop the worker, wait for it, then release the device.
    ///
    /// No-op when already closed. Safe to call repeatedly and at shutdown.
    ///
    /// The link lock is held until the device is released, so a concurrent
    /// `open` or state query waits for the close to finish.
    pub fn close(&self) {
        let mut link = self.link.lock();
        let Some(active) = link.take() else {
            return;
        };

        let port_name = active.config.port_name;
        match active.worker.stop_and_join() {
            Some(mut port) => {
                if let Err(e) = port.close() {
                    warn!(port = %port_name, error = %e, "error while releasing device");
                }
            }
            None => warn!(port = %port_name, "worker lost the port handle"),
        }

        // Unsent payloads belong to the closed session.
        let mut discarded = 0usize;
        while self.outbound.try_pop().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "dropped unsent outbound payloads");
        }
        info!(port = %port_name, "connection closed");
        drop(link);
    }

    pub fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }

    pub fn state(&self) -> ConnectionState {
        if self.is_open() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    /// Configuration of the open connection.
    pub fn config(&self) -> Option<ConnectionConfig> {
        self.link.lock().as_ref().map(|l| l.config.clone())
    }

    /// Counters of the current connection's worker.
    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.link
            .lock()
            .as_ref()
            .map(|l| l.worker.stats().snapshot())
    }

    /// True when the open connection's worker gave up after repeated device
    /// errors. The connection stays OPEN until `close` is called.
    pub fn is_faulted(&self) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|l| l.worker.stats().is_faulted())
    }
}

impl<O: PortOpener> Drop for ConnectionManager<O> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MockPortOpener, MockSerialPort, PortError};
    use crate::queue::{inbound_queue, outbound_queue};
    use std::time::Duration;

    fn manager() -> (ConnectionManager<MockPortOpener>, MockSerialPort) {
        let port = MockSerialPort::new("MOCK0");
        let (in_tx, _in_rx) = inbound_queue(8);
        let (_out_tx, out_rx) = outbound_queue();
        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(1),
            ..WorkerSettings::default()
        };
        let manager =
            ConnectionManager::new(MockPortOpener::new(port.clone()), in_tx, out_rx, settings);
        (manager, port)
    }

    #[test]
    fn test_open_close_cycle() {
        let (manager, port) = manager();
        assert_eq!(manager.state(), ConnectionState::Closed);

        manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        assert!(manager.is_open());
        assert_eq!(manager.config().unwrap().baud_rate, 9600);
        assert!(manager.stats().is_some());

        manager.close();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(port.is_released());
        assert!(manager.stats().is_none());
    }

    #[test]
    fn test_second_open_fails_without_transition() {
        let (manager, port) = manager();
        manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();

        let err = manager
            .open(ConnectionConfig::new("MOCK0", 115200))
            .unwrap_err();
        assert!(matches!(err, ConnectionError::AlreadyOpen));
        assert_eq!(manager.config().unwrap().baud_rate, 9600);
        assert_eq!(port.open_count(), 1);
    }

    #[test]
    fn test_device_error_leaves_closed() {
        let (manager, _port) = manager();
        let err = manager
            .open(ConnectionConfig::new("MISSING", 9600))
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::DeviceError(PortError::NotFound(_))
        ));
        assert!(!manager.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (manager, port) = manager();
        manager.close();
        manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        manager.close();
        manager.close();
        assert_eq!(port.close_count(), 1);
    }

    #[test]
    fn test_unsent_payloads_do_not_leak_into_next_session() {
        let port = MockSerialPort::new("MOCK0");
        let (in_tx, _in_rx) = inbound_queue(8);
        let (out_tx, out_rx) = outbound_queue();
        let observer = out_rx.clone();
        let manager = ConnectionManager::new(
            MockPortOpener::new(port.clone()),
            in_tx,
            out_rx,
            WorkerSettings::default(),
        );

        manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        for _ in 0..1000 {
            out_tx.push(crate::queue::OutboundMessage::new(b"burst".to_vec()).unwrap());
        }
        manager.close();

        assert!(observer.is_empty());
        assert_eq!(port.writes_after_release(), 0);
    }

    #[test]
    fn test_open_waits_for_concurrent_close() {
        let port = MockSerialPort::new("MOCK0");
        let (in_tx, _in_rx) = inbound_queue(8);
        let (_out_tx, out_rx) = outbound_queue();
        let settings = WorkerSettings {
            poll_interval: Duration::from_millis(300),
            ..WorkerSettings::default()
        };
        let manager =
            ConnectionManager::new(MockPortOpener::new(port.clone()), in_tx, out_rx, settings);
        manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        // Let the worker settle into its idle sleep.
        std::thread::sleep(Duration::from_millis(20));

        std::thread::scope(|s| {
            let closer = s.spawn(|| manager.close());
            std::thread::sleep(Duration::from_millis(50));

            manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
            // The first session was fully released before the reopen.
            assert_eq!(port.close_count(), 1);
            assert_eq!(port.open_count(), 2);
            closer.join().unwrap();
        });

        assert!(manager.is_open());
        assert!(!port.is_released());
        assert_eq!(port.close_count(), 1);

        manager.close();
        assert!(port.is_released());
        assert_eq!(port.close_count(), 2);
    }

    #[test]
    fn test_drop_releases_port() {
        let (manager, port) = manager();
        manager.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        drop(manager);
        assert!(port.is_released());
    }
}
