//! gridsort metrics - per-pass timing for the sort engine and its drivers
//!
//! Provides zero-cost instrumentation that completely vanishes when the
//! `metrics` feature is off.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use gridsort_metrics::{PassProfiler, TickTimer};
//!
//! let mut profiler = PassProfiler::new();
//! let mut ticks = TickTimer::new(60); // Rolling window of 60 ticks
//! ticks.begin();
//! profiler.time_stage("scan_blocks", || { /* dispatch */ });
//! ticks.end();
//! println!("{:.2} ms/tick", ticks.tick_time_ms());
//! ```

#[cfg(feature = "metrics")]
mod counter;
#[cfg(feature = "metrics")]
mod pass_profiler;
#[cfg(feature = "metrics")]
mod ring_buffer;
#[cfg(feature = "metrics")]
mod tick_timer;

#[cfg(feature = "metrics")]
pub use counter::EventCounter;
#[cfg(feature = "metrics")]
pub use pass_profiler::{PassProfiler, StageTiming};
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;
#[cfg(feature = "metrics")]
pub use tick_timer::TickTimer;

// ============================================================================
// Macros for conditional compilation
// ============================================================================

/// Time a dispatch stage. Resolves to a direct call when metrics are
/// disabled because the stub profiler just invokes the closure.
#[macro_export]
macro_rules! time_stage {
    ($profiler:expr, $name:expr, $body:block) => {
        $profiler.time_stage($name, || $body)
    };
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct TickTimer;

#[cfg(not(feature = "metrics"))]
impl TickTimer {
    pub fn new(_window: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self) {}
    pub fn ticks_per_second(&self) -> f64 { 0.0 }
    pub fn tick_time_ms(&self) -> f64 { 0.0 }
    pub fn tick_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug)]
pub struct RingBuffer<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> RingBuffer<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _value: T) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct EventCounter;

#[cfg(not(feature = "metrics"))]
impl EventCounter {
    pub fn new() -> Self { Self }
    pub fn add(&mut self, _name: &'static str, _value: u64) {}
    pub fn get(&self, _name: &'static str) -> u64 { 0 }
    pub fn take(&mut self, _name: &'static str) -> u64 { 0 }
    pub fn clear(&mut self) {}
    pub fn iter(&self) -> std::iter::Empty<(&'static str, u64)> { std::iter::empty() }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageTiming {
    pub total: std::time::Duration,
    pub calls: u32,
}

#[cfg(not(feature = "metrics"))]
impl StageTiming {
    pub fn average(&self) -> std::time::Duration { std::time::Duration::ZERO }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct PassProfiler;

#[cfg(not(feature = "metrics"))]
impl PassProfiler {
    pub fn new() -> Self { Self }
    pub fn time_stage<F, R>(&mut self, _name: &'static str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        f()
    }
    pub fn timing(&self, _name: &'static str) -> StageTiming { StageTiming::default() }
    pub fn stages(&self) -> std::iter::Empty<(&'static str, StageTiming)> { std::iter::empty() }
    pub fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_stubs_and_macro_compile() {
        let mut profiler = super::PassProfiler::new();
        let value = crate::time_stage!(profiler, "scan_blocks", { 21 * 2 });
        assert_eq!(value, 42);

        let mut _timer = super::TickTimer::new(60);
        let mut _buffer = super::RingBuffer::<f64>::new(10);
        let mut _counter = super::EventCounter::new();
    }
}
