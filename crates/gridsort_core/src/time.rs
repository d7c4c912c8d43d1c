//! Fixed-rate simulation clock
//!
//! Every tick runs one full sort pass plus the steering kernel, so the
//! clock only needs to hand out a constant `dt`.

use std::time::Duration;

/// Fixed simulation tick rate (60 Hz = 16.666ms per tick)
pub const TICK_RATE_HZ: u32 = 60;
pub const TICK_DURATION: Duration = Duration::from_micros(16_666); // ~16.666ms

/// Simulation time tracker
#[derive(Debug, Clone)]
pub struct SimulationTime {
    tick_count: u64,
    accumulated_time: Duration,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self {
            tick_count: 0,
            accumulated_time: Duration::ZERO,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Step size handed to the steering kernel, in seconds.
    pub fn delta_seconds(&self) -> f32 {
        TICK_DURATION.as_secs_f32()
    }

    /// Advance one tick and return its `dt` in seconds.
    pub fn advance_tick(&mut self) -> f32 {
        self.tick_count += 1;
        self.accumulated_time += TICK_DURATION;
        self.delta_seconds()
    }

    pub fn total_time(&self) -> Duration {
        self.accumulated_time
    }
}

impl Default for SimulationTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut time = SimulationTime::new();
        let dt = time.advance_tick();
        time.advance_tick();
        assert_eq!(time.tick_count(), 2);
        assert_eq!(time.total_time(), TICK_DURATION * 2);
        assert!((dt - 1.0 / TICK_RATE_HZ as f32).abs() < 1e-4);
    }
}
