//! Pluggable request-admission throttling.

use crate::clock::Clock;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Gates network attempts against the remote service's rate ceilings.
///
/// `admit` is called immediately before every network attempt, including
/// retries; each call consumes one admission slot, so the accounting never
/// undercounts dispatched requests. The window state lives inside the
/// limiter instance and is serialized with a lock, never a process global,
/// so concurrent runs in tests do not interfere.
pub trait RateLimiter: Send + Sync {
    /// Blocks the caller until one more request may be sent.
    fn admit(&self);
}

/// Enforces a minimum fixed interval since the previous admitted call.
pub struct FixedInterval {
    delay: Duration,
    last: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl FixedInterval {
    /// Creates a fixed-interval limiter.
    pub fn new(delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
            clock,
        }
    }
}

impl RateLimiter for FixedInterval {
    fn admit(&self) {
        let mut last = self.last.lock();
        if let Some(previous) = *last {
            let elapsed = self.clock.now().saturating_duration_since(previous);
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limit: fixed interval");
                self.clock.sleep(wait);
            }
        }
        *last = Some(self.clock.now());
    }
}

/// Keeps a rolling log of admission timestamps; blocks once the log holds
/// `max_requests` entries younger than `window`, until the oldest exits.
pub struct SlidingWindow {
    window: Duration,
    max_requests: usize,
    log: Mutex<VecDeque<Instant>>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindow {
    /// Creates a sliding-window limiter.
    pub fn new(window: Duration, max_requests: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            max_requests: max_requests.max(1),
            log: Mutex::new(VecDeque::new()),
            clock,
        }
    }

    fn evict_expired(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = log.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                log.pop_front();
            } else {
                break;
            }
        }
    }
}

impl RateLimiter for SlidingWindow {
    fn admit(&self) {
        let mut log = self.log.lock();
        loop {
            let now = self.clock.now();
            self.evict_expired(&mut log, now);
            if log.len() < self.max_requests {
                log.push_back(now);
                return;
            }
            // The front entry is the next to leave the window.
            let Some(&oldest) = log.front() else { continue };
            let wait = self.window - now.saturating_duration_since(oldest);
            debug!(wait_ms = wait.as_millis() as u64, "rate limit: sliding window full");
            self.clock.sleep(wait);
        }
    }
}

/// Counts admissions per aligned window; blocks once the counter reaches
/// `max_requests` until the window rolls over.
///
/// Boundary bursts (two windows' worth of requests straddling a boundary)
/// are an accepted trade-off of this shape.
pub struct FixedWindow {
    window: Duration,
    max_requests: usize,
    state: Mutex<FixedWindowState>,
    clock: Arc<dyn Clock>,
}

struct FixedWindowState {
    epoch: Instant,
    window_index: u64,
    count: usize,
}

impl FixedWindow {
    /// Creates a fixed-window limiter; windows align to the limiter's
    /// creation instant.
    pub fn new(window: Duration, max_requests: usize, clock: Arc<dyn Clock>) -> Self {
        let epoch = clock.now();
        Self {
            window,
            max_requests: max_requests.max(1),
            state: Mutex::new(FixedWindowState {
                epoch,
                window_index: 0,
                count: 0,
            }),
            clock,
        }
    }

    fn window_index(&self, state: &FixedWindowState, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(state.epoch);
        (elapsed.as_nanos() / self.window.as_nanos().max(1)) as u64
    }
}

impl RateLimiter for FixedWindow {
    fn admit(&self) {
        let mut state = self.state.lock();
        loop {
            let now = self.clock.now();
            let index = self.window_index(&state, now);
            if index != state.window_index {
                state.window_index = index;
                state.count = 0;
            }
            if state.count < self.max_requests {
                state.count += 1;
                return;
            }
            let next_boundary = state.epoch + self.window * (state.window_index as u32 + 1);
            let wait = next_boundary.saturating_duration_since(now);
            debug!(wait_ms = wait.as_millis() as u64, "rate limit: fixed window full");
            self.clock.sleep(wait.max(Duration::from_millis(1)));
        }
    }
}

/// Declarative rate-limit configuration.
///
/// Deserializable so sync profiles can select a limiter by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimitPolicy {
    /// Minimum fixed interval between requests.
    FixedWait {
        /// Interval in milliseconds.
        delay_ms: u64,
    },
    /// Rolling log of timestamps over the last `window_ms`.
    SlidingWindow {
        /// Window size in milliseconds.
        window_ms: u64,
        /// Maximum requests per window.
        max_requests: usize,
    },
    /// Counter reset on aligned window boundaries.
    FixedWindow {
        /// Window size in milliseconds.
        window_ms: u64,
        /// Maximum requests per window.
        max_requests: usize,
    },
}

impl RateLimitPolicy {
    /// Builds the configured limiter against the given clock.
    pub fn build(&self, clock: Arc<dyn Clock>) -> Box<dyn RateLimiter> {
        match *self {
            RateLimitPolicy::FixedWait { delay_ms } => {
                Box::new(FixedInterval::new(Duration::from_millis(delay_ms), clock))
            }
            RateLimitPolicy::SlidingWindow {
                window_ms,
                max_requests,
            } => Box::new(SlidingWindow::new(
                Duration::from_millis(window_ms),
                max_requests,
                clock,
            )),
            RateLimitPolicy::FixedWindow {
                window_ms,
                max_requests,
            } => Box::new(FixedWindow::new(
                Duration::from_millis(window_ms),
                max_requests,
                clock,
            )),
        }
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        RateLimitPolicy::FixedWait { delay_ms: 500 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn fixed_interval_spaces_requests() {
        let clock = Arc::new(ManualClock::new());
        let limiter = FixedInterval::new(Duration::from_millis(500), clock.clone());

        limiter.admit();
        assert!(clock.sleeps().is_empty());

        limiter.admit();
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(500)]);

        clock.advance(Duration::from_millis(700));
        limiter.admit();
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[test]
    fn sliding_window_blocks_excess() {
        let clock = Arc::new(ManualClock::new());
        let limiter = SlidingWindow::new(Duration::from_secs(1), 3, clock.clone());

        limiter.admit();
        clock.advance(Duration::from_millis(100));
        limiter.admit();
        clock.advance(Duration::from_millis(100));
        limiter.admit();
        assert!(clock.sleeps().is_empty());

        // Fourth admission within the window must wait until the first
        // timestamp (at t=0) exits the 1s window: 1000 - 200 = 800ms.
        limiter.admit();
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(800)]);
    }

    #[test]
    fn sliding_window_admits_after_expiry() {
        let clock = Arc::new(ManualClock::new());
        let limiter = SlidingWindow::new(Duration::from_secs(1), 2, clock.clone());

        limiter.admit();
        limiter.admit();
        clock.advance(Duration::from_millis(1500));
        limiter.admit();
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn fixed_window_resets_on_boundary() {
        let clock = Arc::new(ManualClock::new());
        let limiter = FixedWindow::new(Duration::from_secs(1), 2, clock.clone());

        limiter.admit();
        limiter.admit();
        assert!(clock.sleeps().is_empty());

        // Third request blocks until the next window boundary.
        limiter.admit();
        assert_eq!(clock.sleeps().len(), 1);
        assert_eq!(clock.sleeps()[0], Duration::from_secs(1));

        // Counter was reset by the rollover; room remains in the new window.
        limiter.admit();
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[test]
    fn policy_builds_each_variant() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        for policy in [
            RateLimitPolicy::FixedWait { delay_ms: 100 },
            RateLimitPolicy::SlidingWindow {
                window_ms: 1000,
                max_requests: 5,
            },
            RateLimitPolicy::FixedWindow {
                window_ms: 1000,
                max_requests: 5,
            },
        ] {
            let limiter = policy.build(clock.clone());
            limiter.admit();
        }
    }
}
