//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! Two read paths: [`Metrics::report`] drains the windowed counters for the
//! periodic log line, [`Metrics::snapshot`] reads the cumulative counters for
//! Prometheus and never resets anything.
//!
//! NOTE: All atomics use Relaxed ordering: these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::TransitionKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps counters to get a consistent snapshot.
pub struct Metrics {
    /// Reports successfully processed (monotonic)
    reports_total: AtomicU64,
    /// Reports processed since last report (reset on report)
    reports_since_report: AtomicU64,
    /// Reports rejected by validation (monotonic)
    reports_rejected: AtomicU64,
    /// Reports that failed on storage (monotonic)
    reports_failed: AtomicU64,
    /// ENTER transitions written (monotonic)
    enters_total: AtomicU64,
    /// EXIT transitions written (monotonic)
    exits_total: AtomicU64,
    /// Sum of latencies in microseconds (reset on report)
    latency_sum_us: AtomicU64,
    /// Max latency in microseconds (reset on report)
    latency_max_us: AtomicU64,
    /// Report processing latency histogram buckets (reset on report)
    latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of latencies in microseconds (monotonic)
    latency_sum_total_us: AtomicU64,
    /// Latency histogram buckets since start (monotonic)
    latency_buckets_total: [AtomicU64; NUM_BUCKETS],
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            reports_total: AtomicU64::new(0),
            reports_since_report: AtomicU64::new(0),
            reports_rejected: AtomicU64::new(0),
            reports_failed: AtomicU64::new(0),
            enters_total: AtomicU64::new(0),
            exits_total: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_total_us: AtomicU64::new(0),
            latency_buckets_total: std::array::from_fn(|_| AtomicU64::new(0)),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a report was processed with given latency (lock-free)
    #[inline]
    pub fn record_report_processed(&self, latency_us: u64) {
        self.reports_total.fetch_add(1, Ordering::Relaxed);
        self.reports_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);

        self.latency_sum_total_us.fetch_add(latency_us, Ordering::Relaxed);

        let bucket = bucket_index(latency_us);
        self.latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.latency_buckets_total[bucket].fetch_add(1, Ordering::Relaxed);

        update_atomic_max(&self.latency_max_us, latency_us);
    }

    #[inline]
    pub fn record_report_rejected(&self) {
        self.reports_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_report_failed(&self) {
        self.reports_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transition(&self, kind: TransitionKind) {
        match kind {
            TransitionKind::Enter => self.enters_total.fetch_add(1, Ordering::Relaxed),
            TransitionKind::Exit => self.exits_total.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn reports_total(&self) -> u64 {
        self.reports_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reports_rejected(&self) -> u64 {
        self.reports_rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn reports_failed(&self) -> u64 {
        self.reports_failed.load(Ordering::Relaxed)
    }

    /// Generate a summary, resetting the windowed counters
    pub fn report(&self, tracked_vehicles: usize, stored_transitions: usize) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *last = now;
            elapsed
        };

        let reports_count = self.reports_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let reports_per_sec =
            if elapsed_secs > 0.0 { reports_count as f64 / elapsed_secs } else { 0.0 };
        let avg_latency = if reports_count > 0 { latency_sum / reports_count } else { 0 };

        MetricsSummary {
            reports_total: self.reports_total.load(Ordering::Relaxed),
            reports_per_sec,
            reports_rejected: self.reports_rejected.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            enters_total: self.enters_total.load(Ordering::Relaxed),
            exits_total: self.exits_total.load(Ordering::Relaxed),
            avg_process_latency_us: avg_latency,
            max_process_latency_us: max_latency,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            tracked_vehicles,
            stored_transitions,
        }
    }
}

impl Metrics {
    /// Read the cumulative counters without touching the reporting window
    pub fn snapshot(&self, tracked_vehicles: usize, stored_transitions: usize) -> MetricsSnapshot {
        MetricsSnapshot {
            reports_total: self.reports_total.load(Ordering::Relaxed),
            reports_rejected: self.reports_rejected.load(Ordering::Relaxed),
            reports_failed: self.reports_failed.load(Ordering::Relaxed),
            enters_total: self.enters_total.load(Ordering::Relaxed),
            exits_total: self.exits_total.load(Ordering::Relaxed),
            latency_sum_us: self.latency_sum_total_us.load(Ordering::Relaxed),
            lat_buckets: std::array::from_fn(|i| {
                self.latency_buckets_total[i].load(Ordering::Relaxed)
            }),
            tracked_vehicles,
            stored_transitions,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub reports_total: u64,
    pub reports_per_sec: f64,
    pub reports_rejected: u64,
    pub reports_failed: u64,
    pub enters_total: u64,
    pub exits_total: u64,
    pub avg_process_latency_us: u64,
    pub max_process_latency_us: u64,
    /// Report processing latency histogram buckets
    /// Bounds: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200 µs
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub tracked_vehicles: usize,
    pub stored_transitions: usize,
}

/// Cumulative counters since process start, for Prometheus exposition
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub reports_total: u64,
    pub reports_rejected: u64,
    pub reports_failed: u64,
    pub enters_total: u64,
    pub exits_total: u64,
    pub latency_sum_us: u64,
    pub lat_buckets: [u64; NUM_BUCKETS],
    pub tracked_vehicles: usize,
    pub stored_transitions: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            reports_total = %self.reports_total,
            reports_per_sec = format!("{:.1}", self.reports_per_sec),
            rejected = %self.reports_rejected,
            failed = %self.reports_failed,
            enters = %self.enters_total,
            exits = %self.exits_total,
            avg_latency_us = %self.avg_process_latency_us,
            max_latency_us = %self.max_process_latency_us,
            p99_us = %self.lat_p99_us,
            vehicles = %self.tracked_vehicles,
            transitions = %self.stored_transitions,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.reports_total(), 0);
        assert_eq!(metrics.reports_rejected(), 0);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(50), 0);
        assert_eq!(bucket_index(100), 0);
        assert_eq!(bucket_index(101), 1);
        assert_eq!(bucket_index(1_000_000), NUM_BUCKETS - 1);
    }

    #[test]
    fn test_report_resets_window_but_not_totals() {
        let metrics = Metrics::new();
        metrics.record_report_processed(150);
        metrics.record_report_processed(250);
        metrics.record_transition(TransitionKind::Enter);
        metrics.record_transition(TransitionKind::Exit);
        metrics.record_transition(TransitionKind::Enter);
        metrics.record_report_rejected();

        let summary = metrics.report(3, 7);
        assert_eq!(summary.reports_total, 2);
        assert_eq!(summary.avg_process_latency_us, 200);
        assert_eq!(summary.max_process_latency_us, 250);
        assert_eq!(summary.enters_total, 2);
        assert_eq!(summary.exits_total, 1);
        assert_eq!(summary.reports_rejected, 1);
        assert_eq!(summary.lat_buckets.iter().sum::<u64>(), 2);
        assert_eq!(summary.tracked_vehicles, 3);

        let summary = metrics.report(3, 7);
        assert_eq!(summary.reports_total, 2);
        assert_eq!(summary.avg_process_latency_us, 0);
        assert_eq!(summary.lat_buckets.iter().sum::<u64>(), 0);
    }

    #[test]
    fn test_snapshot_is_cumulative_and_independent_of_report() {
        let metrics = Metrics::new();
        metrics.record_report_processed(150);
        metrics.record_report_processed(250);

        let first = metrics.snapshot(1, 2);
        metrics.report(1, 2);
        metrics.record_report_processed(50);
        let second = metrics.snapshot(1, 2);

        assert_eq!(first.lat_buckets.iter().sum::<u64>(), 2);
        assert_eq!(first.latency_sum_us, 400);
        assert_eq!(second.lat_buckets.iter().sum::<u64>(), 3);
        assert_eq!(second.latency_sum_us, 450);
        assert!(first.lat_buckets.iter().zip(&second.lat_buckets).all(|(a, b)| a <= b));

        // Scraping leaves the logging window intact
        assert_eq!(metrics.report(1, 2).lat_buckets.iter().sum::<u64>(), 1);
    }

    #[test]
    fn test_percentile_from_buckets() {
        let mut buckets = [0u64; NUM_BUCKETS];
        buckets[0] = 90;
        buckets[5] = 10;
        assert_eq!(percentile_from_buckets(&buckets, 0.50), 100);
        assert_eq!(percentile_from_buckets(&buckets, 0.99), 3200);
        assert_eq!(percentile_from_buckets(&[0; NUM_BUCKETS], 0.99), 0);
    }
}
