//! Bounded undo history of input snapshots.
//!
//! Callers push the current snapshot before each change they consider
//! undo-worthy.  When the buffer is full the oldest entry is dropped.

use crate::models::InputSnapshot;
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<InputSnapshot>,
    capacity: usize,
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryBuffer {
    /// Creates a buffer holding at most `capacity` snapshots.  A capacity
    /// of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: InputSnapshot) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    /// Removes and returns the most recent snapshot, or `None` when there
    /// is nothing to undo.
    pub fn pop(&mut self) -> Option<InputSnapshot> {
        self.entries.pop_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
