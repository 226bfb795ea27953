//! Wall-clock frame timing for real-time sessions.

use std::time::{Duration, Instant};

/// Measures the time between frames.
///
/// The simulation never reads the clock itself; the session asks the
/// frame clock for a delta and passes it into `tick`.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    /// Start measuring now.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start measuring from `start`.
    #[must_use]
    pub const fn starting_at(start: Instant) -> Self {
        Self { last: start }
    }

    /// Milliseconds since the previous frame, and mark a new frame.
    pub fn delta_ms(&mut self) -> u32 {
        self.delta_ms_at(Instant::now())
    }

    /// Milliseconds between the previous frame and `now`, and mark `now`
    /// as the new frame. A `now` earlier than the previous frame yields 0.
    pub fn delta_ms_at(&mut self, now: Instant) -> u32 {
        let elapsed = now.checked_duration_since(self.last).unwrap_or(Duration::ZERO);
        self.last = now.max(self.last);
        u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
