//! Fixed-window sample history for rolling averages

use std::time::Duration;

/// Keeps the last `capacity` samples, overwriting the oldest first.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    samples: Vec<T>,
    capacity: usize,
    next: usize,
}

impl<T: Copy> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub fn push(&mut self, sample: T) {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.next] = sample;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<T> {
        if self.samples.is_empty() {
            return None;
        }
        let idx = (self.next + self.capacity - 1) % self.capacity;
        self.samples.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.next = 0;
    }
}

impl RingBuffer<Duration> {
    pub fn average(&self) -> Duration {
        if self.samples.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.samples.iter().sum();
        sum / self.samples.len() as u32
    }

    pub fn min_max(&self) -> (Duration, Duration) {
        let min = self.samples.iter().min().copied().unwrap_or_default();
        let max = self.samples.iter().max().copied().unwrap_or_default();
        (min, max)
    }
}

impl RingBuffer<f64> {
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}
