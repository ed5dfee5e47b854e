//! Bounded undo history for setting writes.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use super::types::SettingValue;

/// Maximum number of undo entries kept; older ones are evicted first.
pub const UNDO_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry {
    pub setting_key: String,
    pub previous_value: SettingValue,
    pub timestamp: DateTime<Utc>,
}

impl UndoEntry {
    pub fn new(setting_key: impl Into<String>, previous_value: SettingValue) -> Self {
        Self {
            setting_key: setting_key.into(),
            previous_value,
            timestamp: Utc::now(),
        }
    }
}

/// FIFO-evicting stack of [`UndoEntry`] values.
#[derive(Debug, Clone)]
pub struct UndoStack {
    entries: VecDeque<UndoEntry>,
    capacity: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::with_capacity(UNDO_CAPACITY)
    }
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Pushes an entry, returning the evicted oldest one when full.
    pub fn push(&mut self, entry: UndoEntry) -> Option<UndoEntry> {
        if self.capacity == 0 {
            return Some(entry);
        }
        let evicted = if self.entries.len() >= self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn pop(&mut self) -> Option<UndoEntry> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&UndoEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
