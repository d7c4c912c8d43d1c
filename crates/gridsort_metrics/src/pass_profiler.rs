//! Per-stage timing for a fixed sequence of dispatches

use std::time::{Duration, Instant};

/// Accumulated wall time for one named stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTiming {
    pub total: Duration,
    pub calls: u32,
}

impl StageTiming {
    pub fn average(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls
        }
    }
}

/// Records stages in first-seen order so reports follow dispatch order.
#[derive(Debug, Default)]
pub struct PassProfiler {
    stages: Vec<(&'static str, StageTiming)>,
}

impl PassProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_stage<F, R>(&mut self, name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        match self.stages.iter_mut().find(|(n, _)| *n == name) {
            Some((_, timing)) => {
                timing.total += elapsed;
                timing.calls += 1;
            }
            None => self.stages.push((
                name,
                StageTiming {
                    total: elapsed,
                    calls: 1,
                },
            )),
        }
        result
    }

    pub fn timing(&self, name: &'static str) -> StageTiming {
        self.stages
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, t)| *t)
            .unwrap_or_default()
    }

    pub fn stages(&self) -> impl Iterator<Item = (&'static str, StageTiming)> + '_ {
        self.stages.iter().copied()
    }

    pub fn reset(&mut self) {
        self.stages.clear();
    }
}
