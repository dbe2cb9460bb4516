//! Shared test utilities for serial-console integration tests.
//!
//! - Mock device and console builders with fast worker timings
//! - A recording Display Surface that logs every call the pipeline makes
//! - Polling helpers for asserting on work done by background threads

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_console::display::DisplaySurface;
use serial_console::port::{ConnectionConfig, MockPortOpener, MockSerialPort};
use serial_console::worker::WorkerSettings;
use serial_console::{BufferSurface, Console, ConsoleOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const MOCK_PORT: &str = "MOCK0";

/// Worker timings shrunk so tests finish quickly.
pub fn fast_workers() -> WorkerSettings {
    WorkerSettings {
        poll_interval: Duration::from_millis(1),
        display_wait: Duration::from_millis(5),
        max_consecutive_errors: 3,
    }
}

pub fn fast_options() -> ConsoleOptions {
    ConsoleOptions {
        workers: fast_workers(),
        ..ConsoleOptions::default()
    }
}

pub fn mock_config() -> ConnectionConfig {
    ConnectionConfig::new(MOCK_PORT, 115200)
}

/// Create a mock serial port with pre-programmed read data.
pub fn create_mock_port_with_responses(responses: &[&[u8]]) -> MockSerialPort {
    let mock = MockSerialPort::new(MOCK_PORT);
    for response in responses {
        mock.enqueue_read(response);
    }
    mock
}

/// A console over a fresh mock device and an in-memory display.
pub fn mock_console(
    options: ConsoleOptions,
) -> (Console<MockPortOpener, BufferSurface>, MockSerialPort) {
    mock_console_with(MockSerialPort::new(MOCK_PORT), BufferSurface::new(), options)
}

pub fn mock_console_with<S: DisplaySurface + 'static>(
    port: MockSerialPort,
    surface: S,
    options: ConsoleOptions,
) -> (Console<MockPortOpener, S>, MockSerialPort) {
    let console = Console::new(MockPortOpener::new(port.clone()), surface, options)
        .expect("console should start");
    (console, port)
}

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    Append(String),
    Clear,
    ScrollToBottom,
    DeleteOldestLine,
}

/// Display Surface that records calls and lets the test pin the viewport.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    buffer: BufferSurface,
    calls: Vec<SurfaceCall>,
    pinned_away_from_bottom: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a user who scrolled up and stays there.
    pub fn pin_scrolled_up(&self) {
        self.inner.lock().pinned_away_from_bottom = true;
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.lock().calls.clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().buffer.lines()
    }

    pub fn contents(&self) -> String {
        self.inner.lock().buffer.contents()
    }

    pub fn scroll_to_bottom_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == SurfaceCall::ScrollToBottom)
            .count()
    }
}

impl DisplaySurface for RecordingSurface {
    fn append(&mut self, text: &str) {
        let mut state = self.inner.lock();
        state.calls.push(SurfaceCall::Append(text.to_string()));
        state.buffer.append(text);
    }

    fn clear(&mut self) {
        let mut state = self.inner.lock();
        state.calls.push(SurfaceCall::Clear);
        state.buffer.clear();
    }

    fn is_scrolled_to_bottom(&self) -> bool {
        !self.inner.lock().pinned_away_from_bottom
    }

    fn scroll_to_bottom(&mut self) {
        let mut state = self.inner.lock();
        state.calls.push(SurfaceCall::ScrollToBottom);
        state.buffer.scroll_to_bottom();
    }

    fn line_count(&self) -> usize {
        self.inner.lock().buffer.line_count()
    }

    fn delete_oldest_line(&mut self) {
        let mut state = self.inner.lock();
        state.calls.push(SurfaceCall::DeleteOldestLine);
        state.buffer.delete_oldest_line();
    }
}
