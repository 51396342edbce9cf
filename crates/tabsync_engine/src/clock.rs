//! Time abstraction for retry and rate-limit delays.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Clock and sleep primitive used by the retry and rate-limit layers.
///
/// Injectable so tests can run deterministically without real sleeps.
pub trait Clock: Send + Sync {
    /// The current monotonic instant.
    fn now(&self) -> Instant;

    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// The real clock: monotonic `Instant` plus `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// A manually advanced clock for deterministic tests.
///
/// `sleep` advances virtual time instantly and records the requested
/// duration, so tests can assert on the exact delays a component asked for.
#[derive(Debug)]
pub struct ManualClock {
    start: Instant,
    offset: Mutex<Duration>,
    slept: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Creates a clock starting at the current instant.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            slept: Mutex::new(Vec::new()),
        }
    }

    /// Advances virtual time without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }

    /// The durations passed to `sleep`, in call order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.slept.lock().clone()
    }

    /// Total virtual time slept.
    pub fn total_slept(&self) -> Duration {
        self.slept.lock().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock()
    }

    fn sleep(&self, duration: Duration) {
        *self.offset.lock() += duration;
        self.slept.lock().push(duration);
    }
}
