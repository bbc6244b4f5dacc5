//! Backoff - idle polling interval for the poll consumer.

use std::time::Duration;

/// Interval used right after activity.
pub const INITIAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default ceiling. Every poll of a hosted queue is billed, so this should
/// stay high enough to keep an idle consumer cheap.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_millis(51_200);

/// Doubling backoff for empty fetches.
///
/// `next_wait` returns the sleep for the current empty fetch and doubles the
/// interval for the next one, capped at `max`. With the defaults:
/// - 1st empty fetch: 100ms
/// - 2nd: 200ms
/// - 3rd: 400ms
/// - ...
/// - 10th and later: 51.2s
///
/// `reset` goes back to 100ms as soon as a fetch returns messages.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// A `max` below the initial interval wins: every wait is `max`.
    pub fn new(max: Duration) -> Self {
        Self::with_initial(INITIAL_POLL_INTERVAL, max)
    }

    pub fn with_initial(initial: Duration, max: Duration) -> Self {
        let initial = initial.min(max);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn next_wait(&mut self) -> Duration {
        let wait = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        wait
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POLL_INTERVAL)
    }
}
