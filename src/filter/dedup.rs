//! Cross-user near-duplicate suppression.
//!
//! Keeps the last `capacity` message texts from everyone (oldest evicted) and
//! flags a new text as a duplicate when any remembered text is at least
//! `similarity_threshold` similar.
//!
//! Checking and remembering are separate calls: the engine remembers every
//! text that got past the dedup stage (including bypassed ones), so copies of
//! a flooded line keep matching each other.

use std::collections::VecDeque;

use crate::filter::similarity::similarity;

/// Default number of remembered texts.
pub const DEDUP_CAPACITY: usize = 50;

#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    history: VecDeque<String>,
}

impl Default for DedupWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupWindow {
    pub fn new() -> Self {
        Self::with_capacity(DEDUP_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// True iff some remembered text is `>= similarity_threshold` similar.
    pub fn is_duplicate(&self, text: &str, similarity_threshold: f64) -> bool {
        self.history
            .iter()
            .rev()
            .any(|seen| similarity(text, seen) >= similarity_threshold)
    }

    /// Remember `text`, evicting the oldest entry when full.
    pub fn record(&mut self, text: &str) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(text.to_string());
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
