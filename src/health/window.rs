//! Fixed-capacity history of recent samples for one endpoint.
//!
//! # Design Decisions
//! - Slots fill in order; the fill count is tracked explicitly
//! - Once full, the oldest sample is overwritten at the cursor

use crate::health::sample::Sample;

/// Circular buffer holding the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    slots: Vec<Sample>,
    capacity: usize,
    cursor: usize,
}

impl SampleWindow {
    /// Create an empty window. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            cursor: 0,
        }
    }

    /// Record a sample, overwriting the oldest one when full.
    pub fn add(&mut self, sample: Sample) {
        if self.slots.len() < self.capacity {
            self.slots.push(sample);
        } else {
            self.slots[self.cursor] = sample;
        }
        self.cursor = (self.cursor + 1) % self.capacity;
    }

    /// Samples oldest first, most recent last.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        // Until the first wraparound the cursor equals the fill count,
        // so the tail split is empty and this yields the prefix in order.
        let split = if self.is_full() { self.cursor } else { 0 };
        self.slots[split..].iter().chain(self.slots[..split].iter())
    }

    /// Owned copy of [`SampleWindow::iter`].
    pub fn samples(&self) -> Vec<Sample> {
        self.iter().copied().collect()
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

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
