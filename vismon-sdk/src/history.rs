//! Bounded rolling history shared between producers and readers.

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default number of records kept in each engine history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// A fixed-capacity FIFO: appending to a full buffer evicts the oldest entry.
///
/// Append and trim happen under one lock, so concurrent producers never
/// observe the buffer above capacity.
#[derive(Debug)]
pub struct RollingBuffer<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T: Clone> RollingBuffer<T> {
    /// Create a buffer holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    /// Append an entry, returning the one evicted to make room.
    pub fn push(&self, item: T) -> Option<T> {
        let mut items = self.items.lock();
        let evicted = if items.len() >= self.capacity {
            items.pop_front()
        } else {
            None
        };
        items.push_back(item);
        evicted
    }

    /// Copy of every entry, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.items.lock().iter().cloned().collect()
    }

    /// Copy of the entries matching a predicate, oldest first.
    pub fn filtered<F>(&self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.items
            .lock()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Maximum number of retained entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

impl<T: Clone> Default for RollingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
