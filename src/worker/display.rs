use super::{StopSignal, WorkerSettings};
use crate::display::{render_into, DisplaySurface, SharedSettings};
use crate::format::format_message;
use crate::queue::{InboundReceiver, Pop};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// Drains the Inbound Queue into a Display Surface.
///
/// Runs independently of the connection state. On stop it keeps going until
/// the queue is empty, so nothing already received is lost at shutdown.
#[derive(Debug)]
pub struct DisplayWorker {
    stop: StopSignal,
    handle: JoinHandle<u64>,
}

impl DisplayWorker {
    pub fn spawn<S>(
        inbound: InboundReceiver,
        surface: Arc<Mutex<S>>,
        settings: SharedSettings,
        worker_settings: WorkerSettings,
    ) -> std::io::Result<Self>
    where
        S: DisplaySurface + 'static,
    {
        let stop = StopSignal::new();
        let signal = stop.clone();
        let wait = worker_settings.display_wait;

        let handle = thread::Builder::new()
            .name("serial-display".into())
            .spawn(move || drain(inbound, surface, settings, signal, wait))?;

        Ok(Self { stop, handle })
    }

    /// Stop, drain, and wait. Returns the number of messages rendered.
    pub fn stop_and_join(self) -> u64 {
        self.stop.trigger();
        self.handle.join().unwrap_or_else(|_| {
            tracing::error!("display worker panicked");
            0
        })
    }
}

fn drain<S: DisplaySurface>(
    inbound: InboundReceiver,
    surface: Arc<Mutex<S>>,
    settings: SharedSettings,
    stop: StopSignal,
    wait: Duration,
) -> u64 {
    debug!("display worker started");
    let mut rendered = 0u64;

    loop {
        match inbound.pop_timeout(wait) {
            Pop::Message(message) => {
                let snapshot = settings.snapshot();
                let text = format_message(
                    message.payload(),
                    message.received_at(),
                    snapshot.format_options(),
                );
                render_into(&mut *surface.lock(), &text, snapshot.max_lines);
                rendered += 1;
                trace!(chars = text.len(), "rendered inbound message");
            }
            Pop::Timeout => {}
            Pop::Closed => {
                // No producer can ever exist again; nothing left to drain.
                break;
            }
        }

        if stop.is_triggered() && inbound.is_empty() {
            break;
        }
    }

    debug!(rendered, "display worker stopped");
    rendered
}
