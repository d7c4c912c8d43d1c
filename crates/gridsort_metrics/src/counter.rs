//! Named event tallies (clamped keys, active cells, ...)

/// Counters keyed by static names. A handful of names per pass, so a flat
/// vector beats hashing.
#[derive(Debug, Default)]
pub struct EventCounter {
    counters: Vec<(&'static str, u64)>,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &'static str, value: u64) {
        match self.counters.iter_mut().find(|(n, _)| *n == name) {
            Some((_, count)) => *count += value,
            None => self.counters.push((name, value)),
        }
    }

    pub fn get(&self, name: &'static str) -> u64 {
        self.counters
            .iter()
            .find(|(n, _)| *n == name)
            .map_or(0, |(_, count)| *count)
    }

    /// Read a counter and reset it to zero.
    pub fn take(&mut self, name: &'static str) -> u64 {
        self.counters
            .iter_mut()
            .find(|(n, _)| *n == name)
            .map_or(0, |(_, count)| std::mem::take(count))
    }

    pub fn clear(&mut self) {
        self.counters.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.counters.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_take() {
        let mut counter = EventCounter::new();
        counter.add("clamped_keys", 3);
        counter.add("clamped_keys", 2);
        counter.add("active_cells", 7);

        assert_eq!(counter.get("clamped_keys"), 5);
        assert_eq!(counter.take("clamped_keys"), 5);
        assert_eq!(counter.get("clamped_keys"), 0);
        assert_eq!(counter.get("active_cells"), 7);
        assert_eq!(counter.get("missing"), 0);
    }
}
