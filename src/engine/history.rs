//! Fixed-capacity ring buffer.
//!
//! Capacity is a hard bound: once full, every push overwrites the oldest slot
//! (index modulo capacity) and hands the evicted value back to the caller.
//! `len()` never exceeds the capacity.

use std::num::NonZeroUsize;

#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    /// Slot the next push writes to once the buffer is full.
    next: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity.get()),
            capacity: capacity.get(),
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// O(1) append. Returns the evicted oldest entry when the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            self.next = self.slots.len() % self.capacity;
            None
        } else {
            let evicted = std::mem::replace(&mut self.slots[self.next], item);
            self.next = (self.next + 1) % self.capacity;
            Some(evicted)
        }
    }

    fn oldest_index(&self) -> usize {
        if self.is_full() {
            self.next
        } else {
            0
        }
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        let start = self.oldest_index();
        let len = self.slots.len();
        (0..len).map(move |i| &self.slots[(start + i) % len])
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &T> + '_ {
        self.iter().rev().take(limit)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
