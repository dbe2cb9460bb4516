//! Inbound and Outbound queues.
//!
//! The Inbound Queue carries timestamped payloads from the Communication
//! Worker to the Display Worker and is bounded: a full queue drops the newest
//! message instead of stalling the device read path. The Outbound Queue
//! carries send-action payloads to the Communication Worker and never blocks
//! the sender.

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::time::Duration;

/// Default Inbound Queue capacity, in messages.
pub const DEFAULT_INBOUND_CAPACITY: usize = 4096;

/// Bytes read from the device, stamped at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    payload: Vec<u8>,
    received_at: DateTime<Local>,
}

impl InboundMessage {
    /// Returns `None` for an empty payload.
    pub fn new(payload: Vec<u8>, received_at: DateTime<Local>) -> Option<Self> {
        (!payload.is_empty()).then_some(Self {
            payload,
            received_at,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Local> {
        self.received_at
    }
}

/// Bytes to be written to the device, terminator already appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    payload: Vec<u8>,
}

impl OutboundMessage {
    /// Returns `None` for an empty payload.
    pub fn new(payload: Vec<u8>) -> Option<Self> {
        (!payload.is_empty()).then_some(Self { payload })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// Outcome of a non-blocking inbound enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queue at capacity; the message was discarded.
    Dropped,
    /// Display side is gone; the message was discarded.
    Disconnected,
}

/// Producer half of the Inbound Queue.
#[derive(Debug, Clone)]
pub struct InboundSender {
    tx: Sender<InboundMessage>,
}

impl InboundSender {
    /// Enqueue without blocking.
    pub fn try_push(&self, message: InboundMessage) -> PushOutcome {
        match self.tx.try_send(message) {
            Ok(()) => PushOutcome::Queued,
            Err(TrySendError::Full(_)) => PushOutcome::Dropped,
            Err(TrySendError::Disconnected(_)) => PushOutcome::Disconnected,
        }
    }
}

/// Result of a bounded wait on the Inbound Queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Pop {
    Message(InboundMessage),
    /// Nothing arrived within the wait.
    Timeout,
    /// Empty, and every producer has been dropped.
    Closed,
}

/// Consumer half of the Inbound Queue.
#[derive(Debug, Clone)]
pub struct InboundReceiver {
    rx: Receiver<InboundMessage>,
}

impl InboundReceiver {
    /// Wait at most `wait` for the next message.
    pub fn pop_timeout(&self, wait: Duration) -> Pop {
        match self.rx.recv_timeout(wait) {
            Ok(message) => Pop::Message(message),
            Err(RecvTimeoutError::Timeout) => Pop::Timeout,
            Err(RecvTimeoutError::Disconnected) => Pop::Closed,
        }
    }

    /// Take the next message if one is already queued.
    pub fn try_pop(&self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

/// Create a bounded Inbound Queue. A zero capacity is raised to one.
pub fn inbound_queue(capacity: usize) -> (InboundSender, InboundReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (InboundSender { tx }, InboundReceiver { rx })
}

/// Producer half of the Outbound Queue (the send action).
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: Sender<OutboundMessage>,
}

impl OutboundSender {
    /// Enqueue without blocking. Returns `false` only if every consumer
    /// handle has been dropped.
    pub fn push(&self, message: OutboundMessage) -> bool {
        self.tx.send(message).is_ok()
    }
}

/// Consumer half of the Outbound Queue.
///
/// Cloneable so each Communication Worker lifetime can take a handle; only
/// one worker is alive at a time, keeping a single consumer.
#[derive(Debug, Clone)]
pub struct OutboundReceiver {
    rx: Receiver<OutboundMessage>,
}

impl OutboundReceiver {
    /// Take the next message without blocking.
    pub fn try_pop(&self) -> Option<OutboundMessage> {
        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

/// Create an unbounded Outbound Queue.
pub fn outbound_queue() -> (OutboundSender, OutboundReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (OutboundSender { tx }, OutboundReceiver { rx })
}
