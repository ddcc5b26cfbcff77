//! # Exponential Backoff
//!
//! Per-resource retry delays for failed reconciliations. The delay doubles on
//! every consecutive failure, starting from `start` and capped at `max`.
//!
//! ## Usage
//!
//! ```rust
//! use cryostat_operator::controller::backoff::ExponentialBackoff;
//!
//! let mut backoff = ExponentialBackoff::new(1, 300);
//! assert_eq!(backoff.next_backoff_seconds(), 1);
//! assert_eq!(backoff.next_backoff_seconds(), 2);
//! assert_eq!(backoff.next_backoff_seconds(), 4);
//! ```

use std::time::Duration;

/// Exponential backoff calculator
///
/// Each call to [`next_backoff_seconds`](Self::next_backoff_seconds) returns
/// the current delay and doubles it for the next call.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    start_secs: u64,
    current_secs: u64,
    max_secs: u64,
}

impl ExponentialBackoff {
    /// Create a backoff starting at `start_secs`, never exceeding `max_secs`
    #[must_use]
    pub fn new(start_secs: u64, max_secs: u64) -> Self {
        let start_secs = start_secs.max(1);
        Self {
            start_secs,
            current_secs: start_secs.min(max_secs),
            max_secs,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result = self.current_secs;
        self.current_secs = self.current_secs.saturating_mul(2).min(self.max_secs);
        result
    }

    /// Get the next backoff duration as a `Duration` and advance the sequence
    ///
    /// ```
    /// use cryostat_operator::controller::backoff::ExponentialBackoff;
    /// use std::time::Duration;
    ///
    /// let mut backoff = ExponentialBackoff::new(5, 8);
    /// assert_eq!(backoff.next_backoff(), Duration::from_secs(5));
    /// assert_eq!(backoff.next_backoff(), Duration::from_secs(8));
    /// assert_eq!(backoff.next_backoff(), Duration::from_secs(8));
    /// ```
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence after a successful reconciliation
    pub fn reset(&mut self) {
        self.current_secs = self.start_secs.min(self.max_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let mut backoff = ExponentialBackoff::new(1, 300);
        let delays: Vec<u64> = (0..11).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 300, 300]);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut backoff = ExponentialBackoff::new(2, 60);
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();
        assert_eq!(backoff.next_backoff_seconds(), 2);
    }

    #[test]
    fn zero_start_is_treated_as_one_second() {
        let mut backoff = ExponentialBackoff::new(0, 10);
        assert_eq!(backoff.next_backoff_seconds(), 1);
        assert_eq!(backoff.next_backoff_seconds(), 2);
    }
}
