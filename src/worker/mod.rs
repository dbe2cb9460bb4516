//! Long-lived worker threads.
//!
//! - [`CommunicationWorker`]: owns the Device Port for one connection lifetime
//!   and pumps bytes between it and the two queues.
//! - [`DisplayWorker`]: drains the Inbound Queue into a Display Surface for the
//!   lifetime of the process.
//!
//! Both stop cooperatively through a [`StopSignal`] checked once per loop
//! iteration.

mod comm;
mod display;

pub use comm::CommunicationWorker;
pub use display::DisplayWorker;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative, set-once cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Timing knobs for both workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Idle delay of the Communication Worker when no bytes are available.
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    /// Bounded dequeue wait of the Display Worker.
    #[serde(with = "millis")]
    pub display_wait: Duration,
    /// Consecutive device errors after which the link is declared faulted.
    pub max_consecutive_errors: u32,
}

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_DISPLAY_WAIT: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 5;

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            display_wait: DEFAULT_DISPLAY_WAIT,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Counters kept by the Communication Worker, readable from any thread.
#[derive(Debug, Default)]
pub struct WorkerStats {
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
    inbound_dropped: AtomicU64,
    device_errors: AtomicU64,
    faulted: AtomicBool,
}

/// Point-in-time copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub inbound_dropped: u64,
    pub device_errors: u64,
    pub faulted: bool,
}

impl WorkerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            inbound_dropped: self.inbound_dropped.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Acquire),
        }
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    fn add_read(&self, n: usize) {
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_written(&self, n: usize) {
        self.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_dropped(&self) {
        self.inbound_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn add_error(&self) {
        self.device_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn mark_faulted(&self) {
        self.faulted.store(true, Ordering::Release);
    }
}
