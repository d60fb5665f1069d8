// Per-replica counters.
//
// Kept in-process only; the worker logs a summary when it shuts down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::types::ExecutionStatus;

/// Counter metric (monotonically increasing)
#[derive(Debug)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for one worker replica
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    pub dequeued: Counter,
    pub succeeded: Counter,
    pub failed: Counter,
    pub timed_out: Counter,
    /// Items discarded without a result (malformed or no usable id)
    pub dropped: Counter,
    pub persist_failures: Counter,
    pub queue_errors: Counter,
    /// Total execute-stage time across recorded outcomes
    pub execute_millis: Counter,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_outcome(&self, status: ExecutionStatus, duration: Duration) {
        match status {
            ExecutionStatus::Success => self.succeeded.inc(),
            ExecutionStatus::Error => self.failed.inc(),
            ExecutionStatus::Timeout => self.timed_out.inc(),
        }
        self.execute_millis
            .add(duration.as_millis().min(u64::MAX as u128) as u64);
    }

    pub fn completed(&self) -> u64 {
        self.succeeded.get() + self.failed.get() + self.timed_out.get()
    }

    /// One-line summary for the shutdown log
    pub fn summary(&self) -> String {
        format!(
            "dequeued={} succeeded={} failed={} timed_out={} dropped={} persist_failures={} queue_errors={} execute_ms={}",
            self.dequeued.get(),
            self.succeeded.get(),
            self.failed.get(),
            self.timed_out.get(),
            self.dropped.get(),
            self.persist_failures.get(),
            self.queue_errors.get(),
            self.execute_millis.get(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        counter.inc();
        counter.add(4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn test_outcomes_by_status() {
        let metrics = WorkerMetrics::new();
        metrics.record_outcome(ExecutionStatus::Success, Duration::from_millis(10));
        metrics.record_outcome(ExecutionStatus::Error, Duration::from_millis(5));
        metrics.record_outcome(ExecutionStatus::Timeout, Duration::from_secs(1));

        assert_eq!(metrics.succeeded.get(), 1);
        assert_eq!(metrics.failed.get(), 1);
        assert_eq!(metrics.timed_out.get(), 1);
        assert_eq!(metrics.completed(), 3);
        assert_eq!(metrics.execute_millis.get(), 1015);
        assert!(metrics.summary().contains("timed_out=1"));
    }
}
