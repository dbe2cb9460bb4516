//! Move-to-front history of transmitted strings.

/// Ordered list contract exposed to the UI layer.
pub trait HistorySurface {
    /// Insert at the front, removing any existing identical entry.
    fn prepend_unique(&mut self, text: &str);
    fn get(&self, index: usize) -> Option<&str>;
}

/// Recency list: index 0 is the most recently sent string.
///
/// Dedup uses exact string equality; no trimming or case folding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent string. Empty text is ignored.
    pub fn record(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(existing) = self.entries.iter().position(|e| e == text) {
            let entry = self.entries.remove(existing);
            self.entries.insert(0, entry);
        } else {
            self.entries.insert(0, text.to_string());
        }
    }

    /// Look up an entry without changing the order.
    pub fn select(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl HistorySurface for History {
    fn prepend_unique(&mut self, text: &str) {
        self.record(text);
    }

    fn get(&self, index: usize) -> Option<&str> {
        self.select(index)
    }
}
