//! Pluggable retry strategies for transient failures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Computes the backoff delay before a retry.
///
/// Consulted only for errors classified as transient; attempt indices are
/// 1-based (the delay before the first retry is `next_delay(1)`).
pub trait RetryStrategy: Send + Sync {
    /// Delay to wait before retry number `attempt`.
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Exponential backoff: `initial × multiplier^(attempt-1)`, capped at an
/// optional maximum wait.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max_wait: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates an exponential backoff strategy.
    pub fn new(initial: Duration, multiplier: f64, max_wait: Option<Duration>) -> Self {
        Self {
            initial,
            multiplier,
            max_wait,
        }
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent as i32);
        cap(Duration::from_secs_f64(secs), self.max_wait)
    }
}

/// Linear growth: `initial + increment × (attempt-1)`, capped at an
/// optional maximum wait.
#[derive(Debug, Clone)]
pub struct LinearGrowth {
    initial: Duration,
    increment: Duration,
    max_wait: Option<Duration>,
}

impl LinearGrowth {
    /// Creates a linear growth strategy.
    pub fn new(initial: Duration, increment: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            initial,
            increment,
            max_wait,
        }
    }
}

impl RetryStrategy for LinearGrowth {
    fn next_delay(&self, attempt: u32) -> Duration {
        let steps = attempt.saturating_sub(1);
        cap(self.initial + self.increment * steps, self.max_wait)
    }
}

/// Fixed wait: the same delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedWait {
    delay: Duration,
}

impl FixedWait {
    /// Creates a fixed-wait strategy.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl RetryStrategy for FixedWait {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

fn cap(delay: Duration, max_wait: Option<Duration>) -> Duration {
    match max_wait {
        Some(max) => delay.min(max),
        None => delay,
    }
}

/// Declarative retry configuration: attempt budget plus backoff shape.
///
/// Deserializable so sync profiles can select a strategy by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff shape.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Builds the configured strategy.
    pub fn build(&self) -> Box<dyn RetryStrategy> {
        self.backoff.build()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::default(),
        }
    }
}

/// Backoff shape selection for [`RetryPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// Exponential backoff.
    Exponential {
        /// Delay before the first retry, in milliseconds.
        initial_delay_ms: u64,
        /// Growth factor per retry.
        multiplier: f64,
        /// Optional cap on any single delay, in milliseconds.
        max_wait_ms: Option<u64>,
    },
    /// Linear growth.
    Linear {
        /// Delay before the first retry, in milliseconds.
        initial_delay_ms: u64,
        /// Added delay per retry, in milliseconds.
        increment_ms: u64,
        /// Optional cap on any single delay, in milliseconds.
        max_wait_ms: Option<u64>,
    },
    /// Constant delay.
    Fixed {
        /// Delay before every retry, in milliseconds.
        delay_ms: u64,
    },
}

impl Backoff {
    /// Builds the strategy this shape describes.
    pub fn build(&self) -> Box<dyn RetryStrategy> {
        match *self {
            Backoff::Exponential {
                initial_delay_ms,
                multiplier,
                max_wait_ms,
            } => Box::new(ExponentialBackoff::new(
                Duration::from_millis(initial_delay_ms),
                multiplier,
                max_wait_ms.map(Duration::from_millis),
            )),
            Backoff::Linear {
                initial_delay_ms,
                increment_ms,
                max_wait_ms,
            } => Box::new(LinearGrowth::new(
                Duration::from_millis(initial_delay_ms),
                Duration::from_millis(increment_ms),
                max_wait_ms.map(Duration::from_millis),
            )),
            Backoff::Fixed { delay_ms } => Box::new(FixedWait::new(Duration::from_millis(delay_ms))),
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential {
            initial_delay_ms: 500,
            multiplier: 2.0,
            max_wait_ms: None,
        }
    }
}
