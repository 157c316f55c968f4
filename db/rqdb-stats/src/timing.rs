///
/// Elapsed-time measurement for statement timing.
///
/// Results report elapsed time as fractional seconds, so the stopwatch
/// exposes `elapsed_secs()` alongside the raw `Duration`.
///

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}
