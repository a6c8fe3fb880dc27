//! Millisecond clock driving the ARQ engine.

use std::time::Instant;

/// Monotonic clock reporting wrapping 32-bit milliseconds since creation.
///
/// The engine compares timestamps with [`time_diff`](crate::arq::time_diff),
/// so wrap-around after ~49 days is harmless.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    /// Start a clock at the current instant.
    pub fn new() -> Self {
        Self::with_start(Instant::now())
    }

    /// Start a clock at a given instant.
    pub fn with_start(start: Instant) -> Self {
        Self { start }
    }

    /// Milliseconds elapsed since the clock started, truncated to 32 bits.
    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
