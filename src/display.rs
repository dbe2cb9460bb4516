//! Display Surface contract and the capped, scroll-aware append algorithm.

use crate::format::FormatOptions;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

/// Default cap on the number of lines kept by a Display Surface.
pub const DEFAULT_MAX_LINES: usize = 1024;

/// An append-only, scroll-aware text sink.
pub trait DisplaySurface: Send {
    fn append(&mut self, text: &str);
    fn clear(&mut self);
    fn is_scrolled_to_bottom(&self) -> bool;
    fn scroll_to_bottom(&mut self);
    fn line_count(&self) -> usize;
    fn delete_oldest_line(&mut self);
}

/// Append `text`, trim the oldest lines down to `max_lines`, and keep the
/// viewport pinned to the bottom only if it was there before the append.
pub fn render_into<S: DisplaySurface + ?Sized>(surface: &mut S, text: &str, max_lines: usize) {
    let was_at_bottom = surface.is_scrolled_to_bottom();

    surface.append(text);

    let mut count = surface.line_count();
    while count > max_lines {
        surface.delete_oldest_line();
        let after = surface.line_count();
        if after >= count {
            tracing::warn!(count, "display surface did not shrink on delete; giving up trim");
            break;
        }
        count = after;
    }

    if was_at_bottom {
        surface.scroll_to_bottom();
    }
}

/// Formatting and capping flags read by the Display Worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    pub timestamp: bool,
    pub raw: bool,
    pub max_lines: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            timestamp: false,
            raw: false,
            max_lines: DEFAULT_MAX_LINES,
        }
    }
}

impl DisplaySettings {
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            timestamp: self.timestamp,
            raw: self.raw,
        }
    }
}

/// Display settings shared between the UI and the Display Worker.
///
/// Writers update under the lock; the worker copies a snapshot per message.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<DisplaySettings>>,
}

impl SharedSettings {
    pub fn new(settings: DisplaySettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    pub fn snapshot(&self) -> DisplaySettings {
        *self.inner.read()
    }

    pub fn update(&self, f: impl FnOnce(&mut DisplaySettings)) {
        f(&mut self.inner.write());
    }
}

/// In-memory Display Surface.
///
/// Lines are split on `\n`; an unterminated tail counts as a line. Scrolling
/// is modelled as a single "following the bottom" flag.
#[derive(Debug, Clone)]
pub struct BufferSurface {
    lines: VecDeque<String>,
    partial: String,
    at_bottom: bool,
    scroll_to_bottom_calls: usize,
}

impl Default for BufferSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferSurface {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::new(),
            partial: String::new(),
            at_bottom: true,
            scroll_to_bottom_calls: 0,
        }
    }

    /// Simulate the user scrolling away from the bottom.
    pub fn scroll_up(&mut self) {
        self.at_bottom = false;
    }

    /// How many times `scroll_to_bottom` has been invoked.
    pub fn scroll_to_bottom_calls(&self) -> usize {
        self.scroll_to_bottom_calls
    }

    /// Completed lines followed by the unterminated tail, if any.
    pub fn lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.lines.iter().cloned().collect();
        if !self.partial.is_empty() {
            lines.push(self.partial.clone());
        }
        lines
    }

    /// Full buffer text, newlines included.
    pub fn contents(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out.push_str(&self.partial);
        out
    }
}

impl DisplaySurface for BufferSurface {
    fn append(&mut self, text: &str) {
        let mut rest = text;
        while let Some(idx) = rest.find('\n') {
            self.partial.push_str(&rest[..idx]);
            self.lines.push_back(std::mem::take(&mut self.partial));
            rest = &rest[idx + 1..];
        }
        self.partial.push_str(rest);
    }

    fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
        self.at_bottom = true;
    }

    fn is_scrolled_to_bottom(&self) -> bool {
        self.at_bottom
    }

    fn scroll_to_bottom(&mut self) {
        self.at_bottom = true;
        self.scroll_to_bottom_calls += 1;
    }

    fn line_count(&self) -> usize {
        self.lines.len() + usize::from(!self.partial.is_empty())
    }

    fn delete_oldest_line(&mut self) {
        if self.lines.pop_front().is_none() {
            self.partial.clear();
        }
    }
}

/// Writes to stdout and keeps a capped scrollback copy.
///
/// A terminal always follows its output, so it reports being at the bottom.
#[derive(Debug, Default)]
pub struct TerminalSurface {
    scrollback: BufferSurface,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySurface for TerminalSurface {
    fn append(&mut self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout
            .write_all(text.as_bytes())
            .and_then(|()| stdout.flush())
        {
            tracing::warn!(error = %e, "failed to write to terminal");
        }
        self.scrollback.append(text);
    }

    fn clear(&mut self) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout
            .write_all(b"\x1b[2J\x1b[H")
            .and_then(|()| stdout.flush())
        {
            tracing::warn!(error = %e, "failed to clear terminal");
        }
        self.scrollback.clear();
    }

    fn is_scrolled_to_bottom(&self) -> bool {
        true
    }

    fn scroll_to_bottom(&mut self) {}

    fn line_count(&self) -> usize {
        self.scrollback.line_count()
    }

    fn delete_oldest_line(&mut self) {
        self.scrollback.delete_oldest_line();
    }
}
