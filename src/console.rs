//! The control surface the UI layer talks to.
//!
//! [`Console`] wires the pipeline together: one Connection Manager, the
//! Outbound Queue producer, the transmit history, the display flags shared
//! with the Display Worker, and the Display Worker itself.

use crate::config::{parse_max_lines, Config, ConfigResult};
use crate::connection::{ConnectionManager, ConnectionState};
use crate::display::{DisplaySettings, DisplaySurface, SharedSettings};
use crate::error::{ConnectionError, ConnectionResult};
use crate::history::History;
use crate::port::{ConnectionConfig, PortOpener};
use crate::queue::{inbound_queue, outbound_queue, OutboundSender, DEFAULT_INBOUND_CAPACITY};
use crate::transmit::{encode_payload, Terminator};
use crate::worker::{DisplayWorker, StatsSnapshot, WorkerSettings};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Startup parameters for a [`Console`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleOptions {
    pub display: DisplaySettings,
    pub terminator: Terminator,
    pub workers: WorkerSettings,
    pub inbound_capacity: usize,
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            display: DisplaySettings::default(),
            terminator: Terminator::default(),
            workers: WorkerSettings::default(),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

impl From<&Config> for ConsoleOptions {
    fn from(config: &Config) -> Self {
        Self {
            display: config.display.display_settings(),
            terminator: config.transmit.terminator,
            workers: config.workers.worker_settings(),
            inbound_capacity: config.workers.inbound_capacity,
        }
    }
}

pub struct Console<O: PortOpener, S: DisplaySurface + 'static> {
    connection: ConnectionManager<O>,
    outbound: OutboundSender,
    history: History,
    settings: SharedSettings,
    terminator: Terminator,
    surface: Arc<Mutex<S>>,
    display: Option<DisplayWorker>,
}

impl<O: PortOpener, S: DisplaySurface + 'static> Console<O, S> {
    /// Build the queues and start the Display Worker. The connection starts
    /// CLOSED.
    pub fn new(opener: O, surface: S, options: ConsoleOptions) -> ConnectionResult<Self> {
        let (in_tx, in_rx) = inbound_queue(options.inbound_capacity);
        let (out_tx, out_rx) = outbound_queue();
        let settings = SharedSettings::new(options.display);
        let surface = Arc::new(Mutex::new(surface));

        let display = DisplayWorker::spawn(
            in_rx,
            Arc::clone(&surface),
            settings.clone(),
            options.workers,
        )
        .map_err(ConnectionError::Spawn)?;

        Ok(Self {
            connection: ConnectionManager::new(opener, in_tx, out_rx, options.workers),
            outbound: out_tx,
            history: History::new(),
            settings,
            terminator: options.terminator,
            surface,
            display: Some(display),
        })
    }

    pub fn open(&self, config: ConnectionConfig) -> ConnectionResult<()> {
        self.connection.open(config)
    }

    pub fn close(&self) {
        self.connection.close();
    }

    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection_config(&self) -> Option<ConnectionConfig> {
        self.connection.config()
    }

    pub fn is_faulted(&self) -> bool {
        self.connection.is_faulted()
    }

    pub fn stats(&self) -> Option<StatsSnapshot> {
        self.connection.stats()
    }

    /// Send `text` with the selected terminator.
    ///
    /// Non-empty payloads are queued; non-empty text is recorded in the
    /// history. Fails with `NotOpen` while no connection is held and with
    /// `Faulted` once the worker has given up on the device; nothing is
    /// queued or recorded in either case.
    pub fn transmit(&mut self, text: &str) -> ConnectionResult<()> {
        if !self.connection.is_open() {
            return Err(ConnectionError::NotOpen);
        }
        if self.connection.is_faulted() {
            return Err(ConnectionError::Faulted);
        }

        if let Some(message) = encode_payload(text, self.terminator) {
            trace!(bytes = message.payload().len(), "queueing outbound payload");
            if !self.outbound.push(message) {
                debug!("outbound queue has no consumer; payload dropped");
            }
        }
        self.history.record(text);
        Ok(())
    }

    /// Re-send the history entry at `index`. Returns the text sent, or
    /// `None` when the index is out of range.
    pub fn transmit_history(&mut self, index: usize) -> ConnectionResult<Option<String>> {
        let Some(text) = self.history.select(index).map(str::to_owned) else {
            return Ok(None);
        };
        self.transmit(&text)?;
        Ok(Some(text))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn select_history(&self, index: usize) -> Option<&str> {
        self.history.select(index)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Apply an edited max-lines value. Invalid input is rejected and the
    /// previous value stays in effect.
    pub fn set_max_lines_input(&self, input: &str) -> ConfigResult<usize> {
        let max_lines = parse_max_lines(input)?;
        self.settings.update(|s| s.max_lines = max_lines);
        debug!(max_lines, "display line cap changed");
        Ok(max_lines)
    }

    pub fn set_timestamp(&self, enabled: bool) {
        self.settings.update(|s| s.timestamp = enabled);
    }

    pub fn set_raw(&self, enabled: bool) {
        self.settings.update(|s| s.raw = enabled);
    }

    pub fn set_terminator(&mut self, terminator: Terminator) {
        self.terminator = terminator;
    }

    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    pub fn settings(&self) -> DisplaySettings {
        self.settings.snapshot()
    }

    /// The Display Surface, shared with the Display Worker.
    pub fn display(&self) -> &Arc<Mutex<S>> {
        &self.surface
    }

    pub fn clear_display(&self) {
        self.surface.lock().clear();
    }

    /// Close the connection, then stop the Display Worker once it has drained
    /// the Inbound Queue. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.connection.close();
        if let Some(display) = self.display.take() {
            let rendered = display.stop_and_join();
            info!(rendered, "console shut down");
        }
    }
}

impl<O: PortOpener, S: DisplaySurface + 'static> Drop for Console<O, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::BufferSurface;
    use crate::port::{MockPortOpener, MockSerialPort};
    use std::time::{Duration, Instant};

    fn console() -> (Console<MockPortOpener, BufferSurface>, MockSerialPort) {
        let port = MockSerialPort::new("MOCK0");
        let options = ConsoleOptions {
            workers: WorkerSettings {
                poll_interval: Duration::from_millis(1),
                display_wait: Duration::from_millis(5),
                ..WorkerSettings::default()
            },
            ..ConsoleOptions::default()
        };
        let console =
            Console::new(MockPortOpener::new(port.clone()), BufferSurface::new(), options)
                .unwrap();
        (console, port)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_transmit_requires_open_connection() {
        let (mut console, _port) = console();
        assert!(matches!(
            console.transmit("AT"),
            Err(ConnectionError::NotOpen)
        ));
        assert!(console.history().is_empty());
    }

    #[test]
    fn test_transmit_appends_terminator_and_records_history() {
        let (mut console, port) = console();
        console.set_terminator(Terminator::CrLf);
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();

        console.transmit("AT").unwrap();
        assert!(wait_until(|| port.get_write_log().len() == 1));
        assert_eq!(port.get_write_log()[0], b"AT\r\n");
        assert_eq!(console.select_history(0), Some("AT"));
    }

    #[test]
    fn test_empty_text_with_terminator_sends_but_skips_history() {
        let (mut console, port) = console();
        console.set_terminator(Terminator::Lf);
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();

        console.transmit("").unwrap();
        assert!(wait_until(|| port.get_write_log().len() == 1));
        assert_eq!(port.get_write_log()[0], b"\n");
        assert!(console.history().is_empty());
    }

    #[test]
    fn test_transmit_history_moves_entry_to_front() {
        let (mut console, port) = console();
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        console.transmit("x").unwrap();
        console.transmit("y").unwrap();

        assert_eq!(console.transmit_history(1).unwrap().as_deref(), Some("x"));
        assert_eq!(console.history().iter().collect::<Vec<_>>(), vec!["x", "y"]);
        assert!(wait_until(|| port.get_write_log().len() == 3));
        assert_eq!(console.transmit_history(9).unwrap(), None);
    }

    #[test]
    fn test_transmit_on_faulted_link_is_refused() {
        let (mut console, port) = console();
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        port.fail_next(1000);
        assert!(wait_until(|| console.is_faulted()));

        let writes = port.get_write_log().len();
        assert!(matches!(
            console.transmit("AT"),
            Err(ConnectionError::Faulted)
        ));
        assert!(console.history().is_empty());
        assert_eq!(port.get_write_log().len(), writes);

        // A fresh session clears the fault.
        console.close();
        port.fail_next(0);
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        console.transmit("AT").unwrap();
        assert_eq!(console.select_history(0), Some("AT"));
    }

    #[test]
    fn test_clear_history() {
        let (mut console, _port) = console();
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        console.transmit("a").unwrap();
        console.transmit("b").unwrap();
        assert_eq!(console.history().len(), 2);

        console.clear_history();
        assert!(console.history().is_empty());
        assert_eq!(console.transmit_history(0).unwrap(), None);
    }

    #[test]
    fn test_invalid_max_lines_keeps_prior_value() {
        let (console, _port) = console();
        assert_eq!(console.set_max_lines_input("250").unwrap(), 250);
        assert!(console.set_max_lines_input("many").is_err());
        assert!(console.set_max_lines_input("0").is_err());
        assert_eq!(console.settings().max_lines, 250);
    }

    #[test]
    fn test_shutdown_releases_port_and_drains_display() {
        let (mut console, port) = console();
        console.open(ConnectionConfig::new("MOCK0", 9600)).unwrap();
        port.enqueue_read(b"bye\n");
        assert!(wait_until(|| port.available_bytes() == 0));

        console.shutdown();
        assert!(port.is_released());
        assert!(!console.is_open());
        assert_eq!(console.display().lock().lines(), vec!["bye".to_string()]);
        console.shutdown();
    }
}
