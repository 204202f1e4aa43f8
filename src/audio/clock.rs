//! Monotonic session clock for block timestamps.

use std::time::{Duration, Instant};

/// Monotonic time since session start. Cheap to copy into the capture
/// callback; immune to wall-clock adjustment.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    #[inline]
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}
