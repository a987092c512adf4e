//! Rolling metrics backends for protected operations
//!
//! This module provides different metrics implementations:
//! - `RollingMetrics`: thread-safe bucketed window, per operation key
//! - `NullMetrics`: no-op backend for testing and benchmarking
//!
//! Time is read from tokio's clock so paused-time tests drive bucket decay
//! and sleep windows deterministically.

use crate::errors::ConfigError;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one protected execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Success,
    Failure,
    Timeout,
    ShortCircuited,
}

impl EventKind {
    /// Whether the outcome counts toward the error percentage
    pub fn is_error(self) -> bool {
        !matches!(self, EventKind::Success)
    }
}

/// Per-outcome counters summed over the live part of the window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventCounts {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub short_circuited: u64,
    /// Accumulated latency of executed calls, in seconds
    pub latency_secs: f64,
}

impl EventCounts {
    fn add(&mut self, kind: EventKind, latency_secs: f64) {
        match kind {
            EventKind::Success => self.successes += 1,
            EventKind::Failure => self.failures += 1,
            EventKind::Timeout => self.timeouts += 1,
            EventKind::ShortCircuited => self.short_circuited += 1,
        }
        self.latency_secs += latency_secs;
    }

    fn merge(&mut self, other: &EventCounts) {
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.short_circuited += other.short_circuited;
        self.latency_secs += other.latency_secs;
    }

    /// Requests and errors as seen by the trip decision
    pub fn health(&self) -> HealthCounts {
        let errors = self.failures + self.timeouts + self.short_circuited;
        HealthCounts {
            total_requests: self.successes + errors,
            error_count: errors,
        }
    }

    /// Mean latency of executed (not short-circuited) calls in milliseconds
    pub fn mean_latency_ms(&self) -> f64 {
        let executed = self.successes + self.failures + self.timeouts;
        if executed == 0 {
            0.0
        } else {
            self.latency_secs * 1000.0 / executed as f64
        }
    }
}

/// Consistent `{requestCount, errorCount}` snapshot of one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthCounts {
    pub total_requests: u64,
    pub error_count: u64,
}

impl HealthCounts {
    /// Error percentage in `[0, 100]`; an empty window is `0`
    pub fn error_percentage(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.error_count as f64 / self.total_requests as f64 * 100.0
    }
}

/// Abstract metrics backend shared by every circuit of a registry
pub trait MetricsBackend: Send + Sync + std::fmt::Debug {
    /// Record one completed (or rejected) execution
    fn record(&self, key: &str, kind: EventKind, latency_secs: f64);

    /// Per-outcome counts within the rolling window
    fn counts(&self, key: &str) -> EventCounts;

    /// Request and error counts within the rolling window
    fn health(&self, key: &str) -> HealthCounts {
        self.counts(key).health()
    }

    /// Drop all buckets of one key
    fn reset(&self, key: &str);

    /// Drop all buckets of every key
    fn reset_all(&self);

    /// Monotonic time in seconds (relative to backend creation)
    fn monotonic_time(&self) -> f64;
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    index: u64,
    counts: EventCounts,
}

/// Thread-safe bucketed rolling window keyed by operation
///
/// The window is split into `buckets` slots of equal width. Events land in
/// the slot of the current time; slots older than the window no longer
/// contribute and are discarded on the next write.
#[derive(Debug)]
pub struct RollingMetrics {
    windows: RwLock<HashMap<String, VecDeque<Bucket>>>,
    bucket_width: f64,
    buckets: u64,
    start_time: Instant,
}

impl RollingMetrics {
    /// 10 second window over 10 buckets
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            bucket_width: 1.0,
            buckets: 10,
            start_time: Instant::now(),
        }
    }

    /// Create a backend with a custom window length and bucket count
    pub fn with_window(window: Duration, buckets: usize) -> Result<Self, ConfigError> {
        if buckets == 0 || window.as_millis() < buckets as u128 {
            return Err(ConfigError::RollingWindow);
        }

        Ok(Self {
            windows: RwLock::new(HashMap::new()),
            bucket_width: window.as_secs_f64() / buckets as f64,
            buckets: buckets as u64,
            start_time: Instant::now(),
        })
    }

    fn current_index(&self) -> u64 {
        (self.monotonic_time() / self.bucket_width).floor() as u64
    }

    fn is_live(&self, bucket: &Bucket, now_index: u64) -> bool {
        bucket.index + self.buckets > now_index
    }
}

impl Default for RollingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsBackend for RollingMetrics {
    fn record(&self, key: &str, kind: EventKind, latency_secs: f64) {
        let now_index = self.current_index();
        let mut windows = self.windows.write();
        let ring = windows.entry(key.to_string()).or_default();

        while ring
            .front()
            .is_some_and(|bucket| !self.is_live(bucket, now_index))
        {
            ring.pop_front();
        }

        if ring.back().map(|bucket| bucket.index) != Some(now_index) {
            ring.push_back(Bucket {
                index: now_index,
                counts: EventCounts::default(),
            });
        }

        if let Some(bucket) = ring.back_mut() {
            bucket.counts.add(kind, latency_secs);
        }
    }

    fn counts(&self, key: &str) -> EventCounts {
        let now_index = self.current_index();
        let windows = self.windows.read();

        let mut total = EventCounts::default();
        if let Some(ring) = windows.get(key) {
            for bucket in ring.iter().filter(|b| self.is_live(b, now_index)) {
                total.merge(&bucket.counts);
            }
        }
        total
    }

    fn reset(&self, key: &str) {
        self.windows.write().remove(key);
    }

    fn reset_all(&self) {
        self.windows.write().clear();
    }

    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

/// No-op metrics backend for testing and benchmarking
///
/// Discards all events and always reports an empty window, so circuits using
/// it never trip.
#[derive(Debug, Clone, Copy)]
pub struct NullMetrics {
    start_time: Instant,
}

impl NullMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for NullMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsBackend for NullMetrics {
    fn record(&self, _key: &str, _kind: EventKind, _latency_secs: f64) {}

    fn counts(&self, _key: &str) -> EventCounts {
        EventCounts::default()
    }

    fn reset(&self, _key: &str) {}

    fn reset_all(&self) {}

    fn monotonic_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_metrics_record_and_count() {
        let metrics = RollingMetrics::new();

        metrics.record("fetch-following", EventKind::Success, 0.1);
        metrics.record("fetch-following", EventKind::Success, 0.2);
        metrics.record("fetch-following", EventKind::Failure, 0.5);
        metrics.record("fetch-following", EventKind::Timeout, 3.0);

        let counts = metrics.counts("fetch-following");
        assert_eq!(counts.successes, 2);
        assert_eq!(counts.failures, 1);
        assert_eq!(counts.timeouts, 1);

        let health = metrics.health("fetch-following");
        assert_eq!(health.total_requests, 4);
        assert_eq!(health.error_count, 2);
        assert_eq!(health.error_percentage(), 50.0);
    }

    #[test]
    fn test_keys_are_isolated() {
        let metrics = RollingMetrics::new();

        metrics.record("fetch-ratings", EventKind::Failure, 0.0);
        assert_eq!(metrics.health("fetch-ratings").error_count, 1);
        assert_eq!(metrics.health("fetch-following").total_requests, 0);
    }

    #[test]
    fn test_empty_window_has_zero_error_percentage() {
        let metrics = RollingMetrics::new();
        let health = metrics.health("unknown");

        assert_eq!(health, HealthCounts::default());
        assert_eq!(health.error_percentage(), 0.0);
    }

    #[test]
    fn test_short_circuits_count_as_errors_without_latency() {
        let metrics = RollingMetrics::new();

        metrics.record("k", EventKind::Success, 0.004);
        metrics.record("k", EventKind::ShortCircuited, 0.0);

        let counts = metrics.counts("k");
        assert_eq!(counts.short_circuited, 1);
        assert_eq!(counts.health().error_count, 1);
        assert!((counts.mean_latency_ms() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_one_key() {
        let metrics = RollingMetrics::new();

        metrics.record("a", EventKind::Success, 0.1);
        metrics.record("b", EventKind::Success, 0.1);
        metrics.reset("a");

        assert_eq!(metrics.health("a").total_requests, 0);
        assert_eq!(metrics.health("b").total_requests, 1);

        metrics.reset_all();
        assert_eq!(metrics.health("b").total_requests, 0);
    }

    #[test]
    fn test_invalid_window_is_rejected() {
        assert!(RollingMetrics::with_window(Duration::from_secs(10), 0).is_err());
        assert!(RollingMetrics::with_window(Duration::from_millis(5), 10).is_err());
        assert!(RollingMetrics::with_window(Duration::from_secs(1), 10).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buckets_decay_out_of_window() {
        let metrics = RollingMetrics::with_window(Duration::from_secs(10), 10).unwrap();

        metrics.record("k", EventKind::Failure, 0.0);
        tokio::time::advance(Duration::from_secs(5)).await;
        metrics.record("k", EventKind::Success, 0.0);
        assert_eq!(metrics.health("k").total_requests, 2);

        // First bucket falls out of the 10s window, second survives
        tokio::time::advance(Duration::from_secs(6)).await;
        let health = metrics.health("k");
        assert_eq!(health.total_requests, 1);
        assert_eq!(health.error_count, 0);

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(metrics.health("k").total_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monotonic_time_follows_runtime_clock() {
        let metrics = RollingMetrics::new();

        let time1 = metrics.monotonic_time();
        tokio::time::advance(Duration::from_millis(250)).await;
        let time2 = metrics.monotonic_time();

        assert!(time2 - time1 >= 0.25);
    }

    #[test]
    fn test_null_metrics_discards_events() {
        let metrics = NullMetrics::new();

        metrics.record("k", EventKind::Failure, 0.2);
        metrics.reset("k");
        metrics.reset_all();

        assert_eq!(metrics.health("k").total_requests, 0);
    }
}
