// Path: crates/telemetry/src/time.rs
//! A simple RAII timer for measuring the duration of a scope.

use std::time::Instant;

/// Measures the time from construction to drop and reports it to a callback.
pub struct Timer<F: Fn(f64)> {
    start: Instant,
    observe: F,
}

impl<F: Fn(f64)> Timer<F> {
    /// Starts the timer; `observe` receives elapsed seconds on drop.
    pub fn new(observe: F) -> Self {
        Self {
            start: Instant::now(),
            observe,
        }
    }
}

impl<F: Fn(f64)> Drop for Timer<F> {
    fn drop(&mut self) {
        (self.observe)(self.start.elapsed().as_secs_f64());
    }
}
