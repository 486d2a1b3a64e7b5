//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics so the fix path never contends on a mutex. Reporting swaps
//! the periodic counters to zero to get a consistent window.
//!
//! NOTE: All atomics use Relaxed ordering; these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Prometheus-style exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
const BUCKET_BOUNDS: [u64; 10] = [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const METRICS_NUM_BUCKETS: usize = 11;

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
fn swap_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    let mut result = [0u64; METRICS_NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; METRICS_NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    // Rank of the sample at `percentile`, at least the first one
    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; METRICS_NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[METRICS_NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Fixes that went through status computation (monotonic)
    fixes_total: AtomicU64,
    /// Fixes since last report (reset on report)
    fixes_since_report: AtomicU64,
    /// Sum of fix processing latencies (reset on report)
    latency_sum_us: AtomicU64,
    /// Max fix processing latency (reset on report)
    latency_max_us: AtomicU64,
    /// Fix processing latency histogram (reset on report)
    latency_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
    /// Fixes older than the last processed one (monotonic)
    stale_fixes_dropped: AtomicU64,
    /// Fixes with unusable coordinates (monotonic)
    invalid_fixes_dropped: AtomicU64,
    /// Fixes that arrived with no active session (monotonic)
    inactive_fixes_dropped: AtomicU64,
    /// Zone evaluations skipped for invalid config (monotonic)
    zones_skipped: AtomicU64,
    /// Entry events emitted (monotonic)
    entries_total: AtomicU64,
    /// Exit events emitted (monotonic)
    exits_total: AtomicU64,
    /// Notifications delivered by the bridge (monotonic)
    notifications_sent: AtomicU64,
    /// Notifications the bridge failed to deliver (monotonic)
    notifications_failed: AtomicU64,
    /// Notifications dropped because the dispatch queue was full (monotonic)
    notifications_dropped: AtomicU64,
    /// Background task invocations that carried an error or bad payload (monotonic)
    background_task_errors: AtomicU64,
    /// Last report time (only accessed from reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            fixes_total: AtomicU64::new(0),
            fixes_since_report: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
            latency_max_us: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            stale_fixes_dropped: AtomicU64::new(0),
            invalid_fixes_dropped: AtomicU64::new(0),
            inactive_fixes_dropped: AtomicU64::new(0),
            zones_skipped: AtomicU64::new(0),
            entries_total: AtomicU64::new(0),
            exits_total: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            notifications_failed: AtomicU64::new(0),
            notifications_dropped: AtomicU64::new(0),
            background_task_errors: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record a processed fix with its processing latency
    #[inline]
    pub fn record_fix_processed(&self, latency_us: u64) {
        self.fixes_total.fetch_add(1, Ordering::Relaxed);
        self.fixes_since_report.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.latency_max_us, latency_us);
        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stale_fix(&self) {
        self.stale_fixes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_invalid_fix(&self) {
        self.invalid_fixes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_inactive_fix(&self) {
        self.inactive_fixes_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_zone_skipped(&self) {
        self.zones_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_entry(&self) {
        self.entries_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_exit(&self) {
        self.exits_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_dropped(&self) {
        self.notifications_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_background_task_error(&self) {
        self.background_task_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fixes_total(&self) -> u64 {
        self.fixes_total.load(Ordering::Relaxed)
    }

    pub fn stale_fixes_dropped(&self) -> u64 {
        self.stale_fixes_dropped.load(Ordering::Relaxed)
    }

    pub fn invalid_fixes_dropped(&self) -> u64 {
        self.invalid_fixes_dropped.load(Ordering::Relaxed)
    }

    pub fn inactive_fixes_dropped(&self) -> u64 {
        self.inactive_fixes_dropped.load(Ordering::Relaxed)
    }

    pub fn zones_skipped(&self) -> u64 {
        self.zones_skipped.load(Ordering::Relaxed)
    }

    pub fn entries_total(&self) -> u64 {
        self.entries_total.load(Ordering::Relaxed)
    }

    pub fn exits_total(&self) -> u64 {
        self.exits_total.load(Ordering::Relaxed)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn notifications_failed(&self) -> u64 {
        self.notifications_failed.load(Ordering::Relaxed)
    }

    pub fn notifications_dropped(&self) -> u64 {
        self.notifications_dropped.load(Ordering::Relaxed)
    }

    pub fn background_task_errors(&self) -> u64 {
        self.background_task_errors.load(Ordering::Relaxed)
    }

    /// Produce a summary and reset the periodic counters
    pub fn report(&self) -> MetricsSummary {
        let fixes_count = self.fixes_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.latency_sum_us.swap(0, Ordering::Relaxed);
        let max_latency = self.latency_max_us.swap(0, Ordering::Relaxed);
        let lat_buckets = swap_buckets(&self.latency_buckets);

        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let fixes_per_sec = if elapsed.as_secs_f64() > 0.0 {
            fixes_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let avg_latency = if fixes_count > 0 { latency_sum / fixes_count } else { 0 };

        MetricsSummary {
            fixes_total: self.fixes_total(),
            fixes_per_sec,
            avg_fix_latency_us: avg_latency,
            max_fix_latency_us: max_latency,
            lat_buckets,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            stale_fixes_dropped: self.stale_fixes_dropped(),
            invalid_fixes_dropped: self.invalid_fixes_dropped(),
            inactive_fixes_dropped: self.inactive_fixes_dropped(),
            zones_skipped: self.zones_skipped(),
            entries_total: self.entries_total(),
            exits_total: self.exits_total(),
            notifications_sent: self.notifications_sent(),
            notifications_failed: self.notifications_failed(),
            notifications_dropped: self.notifications_dropped(),
            background_task_errors: self.background_task_errors(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub fixes_total: u64,
    pub fixes_per_sec: f64,
    pub avg_fix_latency_us: u64,
    pub max_fix_latency_us: u64,
    pub lat_buckets: [u64; METRICS_NUM_BUCKETS],
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub stale_fixes_dropped: u64,
    pub invalid_fixes_dropped: u64,
    pub inactive_fixes_dropped: u64,
    pub zones_skipped: u64,
    pub entries_total: u64,
    pub exits_total: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub notifications_dropped: u64,
    pub background_task_errors: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            fixes_total = %self.fixes_total,
            fixes_per_sec = format!("{:.2}", self.fixes_per_sec),
            avg_latency_us = %self.avg_fix_latency_us,
            max_latency_us = %self.max_fix_latency_us,
            p50_us = %self.lat_p50_us,
            p95_us = %self.lat_p95_us,
            p99_us = %self.lat_p99_us,
            stale_dropped = %self.stale_fixes_dropped,
            invalid_dropped = %self.invalid_fixes_dropped,
            inactive_dropped = %self.inactive_fixes_dropped,
            zones_skipped = %self.zones_skipped,
            entries = %self.entries_total,
            exits = %self.exits_total,
            notify_sent = %self.notifications_sent,
            notify_failed = %self.notifications_failed,
            notify_dropped = %self.notifications_dropped,
            background_errors = %self.background_task_errors,
            "metrics"
        );
    }
}
