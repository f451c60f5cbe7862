//! Per-pool task counters and run-time histogram.

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// One hour in nanoseconds, 3 significant figures.
const MAX_TRACKED_NS: u64 = 3_600_000_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

/// Pool metrics collector
#[derive(Debug)]
pub struct Metrics {
    tasks_started: AtomicU64,
    tasks_finished: AtomicU64,
    tasks_panicked: AtomicU64,
    busy_time_ns: AtomicU64,

    // Absent only if the histogram bounds are rejected, in which case
    // durations are still summed into `busy_time_ns`.
    run_time: Option<RwLock<Histogram<u64>>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        let run_time = Histogram::new_with_max(MAX_TRACKED_NS, SIGNIFICANT_FIGURES)
            .ok()
            .map(RwLock::new);

        Self {
            tasks_started: AtomicU64::new(0),
            tasks_finished: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
            busy_time_ns: AtomicU64::new(0),
            run_time,
            start_time: Instant::now(),
        }
    }

    pub fn record_task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task whose `run` returned normally.
    pub fn record_task_finished(&self, duration: Duration) {
        self.record_duration(duration);
        self.tasks_finished.fetch_add(1, Ordering::Release);
    }

    /// Record a task whose `run` panicked.
    pub fn record_task_panic(&self, duration: Duration) {
        self.record_duration(duration);
        self.tasks_panicked.fetch_add(1, Ordering::Release);
    }

    fn record_duration(&self, duration: Duration) {
        let ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.busy_time_ns.fetch_add(ns, Ordering::Relaxed);

        if let Some(run_time) = &self.run_time {
            run_time.write().saturating_record(ns);
        }
    }

    /// Tasks that ran to completion or panicked.
    pub fn tasks_completed(&self) -> u64 {
        self.tasks_finished.load(Ordering::Acquire) + self.tasks_panicked.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (mean, p50, p99, max) = match &self.run_time {
            Some(run_time) => {
                let hist = run_time.read();
                if hist.len() == 0 {
                    (0, 0, 0, 0)
                } else {
                    (
                        hist.mean() as u64,
                        hist.value_at_quantile(0.50),
                        hist.value_at_quantile(0.99),
                        hist.max(),
                    )
                }
            }
            None => (0, 0, 0, 0),
        };

        MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_finished: self.tasks_finished.load(Ordering::Acquire),
            tasks_panicked: self.tasks_panicked.load(Ordering::Acquire),
            busy_time: Duration::from_nanos(self.busy_time_ns.load(Ordering::Relaxed)),
            mean_run_ns: mean,
            p50_run_ns: p50,
            p99_run_ns: p99,
            max_run_ns: max,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of a pool's metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub tasks_started: u64,
    pub tasks_finished: u64,
    pub tasks_panicked: u64,
    pub busy_time: Duration,
    pub mean_run_ns: u64,
    pub p50_run_ns: u64,
    pub p99_run_ns: u64,
    pub max_run_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks currently running (started but not yet returned).
    pub fn tasks_in_flight(&self) -> u64 {
        self.tasks_started
            .saturating_sub(self.tasks_finished + self.tasks_panicked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let metrics = Metrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.tasks_started, 0);
        assert_eq!(snap.max_run_ns, 0);
        assert_eq!(snap.tasks_in_flight(), 0);
    }

    #[test]
    fn test_record_tasks() {
        let metrics = Metrics::new();

        metrics.record_task_started();
        metrics.record_task_started();
        metrics.record_task_started();
        metrics.record_task_finished(Duration::from_micros(10));
        metrics.record_task_panic(Duration::from_micros(30));

        let snap = metrics.snapshot();
        assert_eq!(snap.tasks_started, 3);
        assert_eq!(snap.tasks_finished, 1);
        assert_eq!(snap.tasks_panicked, 1);
        assert_eq!(snap.tasks_in_flight(), 1);
        assert_eq!(metrics.tasks_completed(), 2);
        assert_eq!(snap.busy_time, Duration::from_micros(40));
        assert!(snap.max_run_ns >= 29_000);
    }
}
