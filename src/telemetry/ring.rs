//! Fixed-capacity utilization history

use std::collections::VecDeque;

use super::snapshot::UsageSample;

/// Samples kept per metric for the live view
pub const HISTORY_CAPACITY: usize = 120;

/// Append-only buffer that drops its oldest element once full
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        while self.items.len() >= self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
    }
}

/// The three live utilization series
#[derive(Debug, Clone, PartialEq)]
pub struct UsageHistory {
    pub cpu: RingBuffer<f64>,
    pub memory: RingBuffer<f64>,
    pub gpu: RingBuffer<f64>,
}

impl UsageHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cpu: RingBuffer::new(capacity),
            memory: RingBuffer::new(capacity),
            gpu: RingBuffer::new(capacity),
        }
    }

    pub fn record(&mut self, sample: UsageSample) {
        self.cpu.push(sample.cpu);
        self.memory.push(sample.memory);
        self.gpu.push(sample.gpu);
    }

    pub fn len(&self) -> usize {
        self.cpu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_empty()
    }
}

impl Default for UsageHistory {
    fn default() -> Self {
        Self::new()
    }
}
