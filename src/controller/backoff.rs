//! # Fibonacci Backoff
//!
//! Progressive retry delays for projects whose reconciliation keeps failing.
//! Grows more slowly than exponential backoff so a project stuck on a transient
//! API server problem recovers within minutes rather than hours.
//!
//! The sequence is expressed in multiples of the base step:
//! 1, 1, 2, 3, 5, 8, ... capped at the maximum.
//!
//! ```rust
//! use pages_release_controller::controller::backoff::FibonacciBackoff;
//! use std::time::Duration;
//!
//! let mut backoff = FibonacciBackoff::new(Duration::from_secs(60), Duration::from_secs(600));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
//! assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Base step in seconds
    step_secs: u64,
    /// Previous multiple of the step
    prev: u64,
    /// Current multiple of the step
    current: u64,
    /// Cap in seconds
    max_secs: u64,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `step` and capped at `max`
    #[must_use]
    pub fn new(step: Duration, max: Duration) -> Self {
        let step_secs = step.as_secs().max(1);
        Self {
            step_secs,
            prev: 0,
            current: 1,
            max_secs: max.as_secs().max(step_secs),
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self
            .current
            .saturating_mul(self.step_secs)
            .min(self.max_secs);

        // Stop growing once the cap is reached
        if result < self.max_secs {
            let next = self.prev.saturating_add(self.current);
            self.prev = self.current;
            self.current = next;
        }

        result
    }

    /// Get the next backoff duration and advance the sequence
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence after a successful reconciliation
    pub fn reset(&mut self) {
        self.prev = 0;
        self.current = 1;
    }
}

impl Default for FibonacciBackoff {
    /// 1 minute step, 10 minute cap
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_is_capped_at_ten_minutes() {
        let mut backoff = FibonacciBackoff::default();

        // 1m, 1m, 2m, 3m, 5m, 8m, 10m (max)
        let observed: Vec<u64> = (0..9).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(observed, vec![60, 60, 120, 180, 300, 480, 600, 600, 600]);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = FibonacciBackoff::default();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();

        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
    }

    #[test]
    fn test_custom_step() {
        let mut backoff = FibonacciBackoff::new(Duration::from_secs(10), Duration::from_secs(45));
        let observed: Vec<u64> = (0..6).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(observed, vec![10, 10, 20, 30, 45, 45]);
    }

    #[test]
    fn test_independent_instances() {
        let mut first = FibonacciBackoff::default();
        let mut second = FibonacciBackoff::default();
        first.next_backoff_seconds();
        first.next_backoff_seconds();
        first.next_backoff_seconds();

        assert_eq!(second.next_backoff_seconds(), 60);
        assert_eq!(first.next_backoff_seconds(), 180);
    }
}
