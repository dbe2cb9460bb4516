use super::{StopSignal, WorkerSettings, WorkerStats};
use crate::port::{PortError, SerialPortAdapter};
use crate::queue::{InboundMessage, InboundSender, OutboundReceiver, PushOutcome};
use chrono::Local;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace, warn};

type PortHandle = Box<dyn SerialPortAdapter>;

/// Owns the Device Port for one connection lifetime.
///
/// Each iteration reads whatever the device has buffered into the Inbound
/// Queue (dropping it if the queue is full), idles for the poll interval when
/// nothing was available, writes at most one Outbound Queue item, then checks
/// the stop signal. Outbound items still queued at stop are not written.
///
/// Device errors are logged and counted. After `max_consecutive_errors`
/// failing iterations in a row the worker marks the link faulted and exits on
/// its own; the port is still handed back on join.
#[derive(Debug)]
pub struct CommunicationWorker {
    stop: StopSignal,
    handle: JoinHandle<PortHandle>,
    stats: Arc<WorkerStats>,
}

impl CommunicationWorker {
    /// Start the worker thread. On spawn failure the port is dropped.
    pub fn spawn(
        port: PortHandle,
        inbound: InboundSender,
        outbound: OutboundReceiver,
        settings: WorkerSettings,
    ) -> std::io::Result<Self> {
        let stop = StopSignal::new();
        let stats = Arc::new(WorkerStats::default());

        let pump = Pump {
            port,
            inbound,
            outbound,
            settings,
            stop: stop.clone(),
            stats: Arc::clone(&stats),
            consecutive_errors: 0,
        };
        let handle = thread::Builder::new()
            .name("serial-comm".into())
            .spawn(move || pump.run())?;

        Ok(Self {
            stop,
            handle,
            stats,
        })
    }

    pub fn stats(&self) -> &Arc<WorkerStats> {
        &self.stats
    }

    /// Whether the thread has exited (stopped or faulted).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal stop, wait for the thread, and take the port back.
    ///
    /// Returns `None` only if the worker panicked.
    pub fn stop_and_join(self) -> Option<PortHandle> {
        self.stop.trigger();
        match self.handle.join() {
            Ok(port) => Some(port),
            Err(_) => {
                error!("communication worker panicked; port handle lost");
                None
            }
        }
    }
}

struct Pump {
    port: PortHandle,
    inbound: InboundSender,
    outbound: OutboundReceiver,
    settings: WorkerSettings,
    stop: StopSignal,
    stats: Arc<WorkerStats>,
    consecutive_errors: u32,
}

impl Pump {
    fn run(mut self) -> PortHandle {
        debug!(port = self.port.name(), "communication worker started");

        loop {
            let mut failed = false;

            match self.read_available() {
                Ok(0) => thread::sleep(self.settings.poll_interval),
                Ok(_) => {}
                Err(e) => {
                    warn!(port = self.port.name(), error = %e, "device read failed");
                    failed = true;
                    thread::sleep(self.settings.poll_interval);
                }
            }

            if let Some(message) = self.outbound.try_pop() {
                if let Err(e) = self.write(message.payload()) {
                    warn!(port = self.port.name(), error = %e, "device write failed; payload discarded");
                    failed = true;
                }
            }

            if self.record_outcome(failed) {
                error!(
                    port = self.port.name(),
                    errors = self.consecutive_errors,
                    "device keeps failing; communication worker giving up"
                );
                self.stats.mark_faulted();
                break;
            }

            if self.stop.is_triggered() {
                break;
            }
        }

        debug!(port = self.port.name(), "communication worker stopped");
        self.port
    }

    /// Returns the number of bytes read (0 when the device had nothing).
    fn read_available(&mut self) -> Result<usize, PortError> {
        let available = self.port.bytes_available()?;
        if available == 0 {
            return Ok(0);
        }

        let payload = self.port.read_bytes(available)?;
        let count = payload.len();
        self.stats.add_read(count);

        if let Some(message) = InboundMessage::new(payload, Local::now()) {
            match self.inbound.try_push(message) {
                PushOutcome::Queued => trace!(bytes = count, "queued inbound payload"),
                PushOutcome::Dropped => {
                    self.stats.add_dropped();
                    warn!(bytes = count, "inbound queue full; payload dropped");
                }
                PushOutcome::Disconnected => {
                    self.stats.add_dropped();
                    debug!(bytes = count, "display side gone; payload dropped");
                }
            }
        }
        Ok(count)
    }

    fn write(&mut self, payload: &[u8]) -> Result<(), PortError> {
        let written = self.port.write_bytes(payload)?;
        self.port.flush()?;
        self.stats.add_written(written);
        trace!(bytes = written, "wrote outbound payload");
        Ok(())
    }

    /// Track consecutive failures; returns `true` once the limit is reached.
    fn record_outcome(&mut self, failed: bool) -> bool {
        if !failed {
            self.consecutive_errors = 0;
            return false;
        }
        self.stats.add_error();
        self.consecutive_errors += 1;
        let limit = self.settings.max_consecutive_errors;
        limit > 0 && self.consecutive_errors >= limit
    }
}
