//! # Requeue Backoff
//!
//! Fibonacci backoff for clusters whose reconciliation keeps failing.
//!
//! The sequence grows more slowly than exponential backoff:
//! with a 5s minimum and 300s maximum it runs 5s, 5s, 10s, 15s, 25s, 40s, ...
//! up to 300s. State is kept per cluster so one failing cluster does not slow
//! down the others.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fibonacci backoff sequence in seconds
#[derive(Debug, Clone)]
pub struct RequeueBackoff {
    min_secs: u64,
    max_secs: u64,
    prev_secs: u64,
    current_secs: u64,
    failures: u32,
}

impl RequeueBackoff {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        let min_secs = min_secs.max(1);
        Self {
            min_secs,
            max_secs: max_secs.max(min_secs),
            prev_secs: 0,
            current_secs: min_secs,
            failures: 0,
        }
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_secs;
        let next = self.prev_secs.saturating_add(self.current_secs);
        self.prev_secs = self.current_secs;
        self.current_secs = next.min(self.max_secs);
        self.failures = self.failures.saturating_add(1);
        Duration::from_secs(delay)
    }

    /// Consecutive failures recorded since the last reset
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn reset(&mut self) {
        self.prev_secs = 0;
        self.current_secs = self.min_secs;
        self.failures = 0;
    }
}

/// Per-cluster backoff state, keyed by `namespace/name`
#[derive(Debug)]
pub struct BackoffTracker {
    min_secs: u64,
    max_secs: u64,
    states: Mutex<HashMap<String, RequeueBackoff>>,
}

impl BackoffTracker {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs,
            max_secs,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Record a failure for `key`, returning the delay and the failure count
    pub fn record_failure(&self, key: &str) -> (Duration, u32) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states
            .entry(key.to_string())
            .or_insert_with(|| RequeueBackoff::new(self.min_secs, self.max_secs));
        let delay = state.next_delay();
        (delay, state.failures())
    }

    /// Forget the failures of `key` after a successful pass
    pub fn reset(&self, key: &str) {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    #[must_use]
    pub fn failures(&self, key: &str) -> u32 {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, RequeueBackoff::failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(backoff: &mut RequeueBackoff) -> u64 {
        backoff.next_delay().as_secs()
    }

    #[test]
    fn test_sequence_is_capped() {
        let mut backoff = RequeueBackoff::new(5, 30);
        let seq: Vec<u64> = (0..8).map(|_| secs(&mut backoff)).collect();
        assert_eq!(seq, vec![5, 5, 10, 15, 25, 30, 30, 30]);
        assert_eq!(backoff.failures(), 8);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut backoff = RequeueBackoff::new(5, 300);
        secs(&mut backoff);
        secs(&mut backoff);
        secs(&mut backoff);
        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert_eq!(secs(&mut backoff), 5);
        assert_eq!(secs(&mut backoff), 5);
    }

    #[test]
    fn test_zero_minimum_is_clamped() {
        let mut backoff = RequeueBackoff::new(0, 0);
        assert_eq!(secs(&mut backoff), 1);
        assert_eq!(secs(&mut backoff), 1);
    }

    #[test]
    fn test_tracker_keeps_clusters_independent() {
        let tracker = BackoffTracker::new(5, 300);
        tracker.record_failure("a/logs");
        tracker.record_failure("a/logs");
        let (delay, count) = tracker.record_failure("a/logs");
        assert_eq!(delay, Duration::from_secs(10));
        assert_eq!(count, 3);

        let (delay, count) = tracker.record_failure("b/metrics");
        assert_eq!(delay, Duration::from_secs(5));
        assert_eq!(count, 1);

        tracker.reset("a/logs");
        assert_eq!(tracker.failures("a/logs"), 0);
        assert_eq!(tracker.failures("b/metrics"), 1);
    }
}
