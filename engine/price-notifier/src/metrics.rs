// Metrics collection for PriceNotifier

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics collector for PriceNotifier monitoring
#[derive(Debug)]
pub struct MetricsCollector {
    // Price update metrics
    pub updates_total: AtomicCounter,
    pub updates_rejected_total: AtomicCounter,
    pub instruments_active: AtomicGauge,

    // Subscription metrics
    pub registrations_total: AtomicCounter,
    pub removals_total: AtomicCounter,

    // Delivery metrics
    pub deliveries_scheduled_total: AtomicCounter,
    pub deliveries_succeeded_total: AtomicCounter,
    pub deliveries_failed_total: AtomicCounter,
    pub deliveries_in_flight: AtomicGauge,
    /// Delivery latency in microseconds
    pub delivery_latency: AtomicHistogram,

    pub system_health: AtomicGauge,
    pub uptime_start: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            updates_total: AtomicCounter::new(),
            updates_rejected_total: AtomicCounter::new(),
            instruments_active: AtomicGauge::new(),
            registrations_total: AtomicCounter::new(),
            removals_total: AtomicCounter::new(),
            deliveries_scheduled_total: AtomicCounter::new(),
            deliveries_succeeded_total: AtomicCounter::new(),
            deliveries_failed_total: AtomicCounter::new(),
            deliveries_in_flight: AtomicGauge::new(),
            delivery_latency: AtomicHistogram::new(),
            system_health: AtomicGauge::new(),
            uptime_start: Instant::now(),
        }
    }

    pub fn uptime(&self) -> std::time::Duration {
        self.uptime_start.elapsed()
    }

    /// Calculate system health score (0-100) from the delivery failure rate
    pub fn calculate_health_score(&self) -> u64 {
        let succeeded = self.deliveries_succeeded_total.get();
        let failed = self.deliveries_failed_total.get();
        let completed = succeeded + failed;

        let failure_rate = if completed > 0 { (failed * 100) / completed } else { 0 };

        if failure_rate > 10 {
            0
        } else if failure_rate > 1 {
            25
        } else if failure_rate > 0 {
            75
        } else {
            100
        }
    }

    pub fn update_health_score(&self) {
        self.system_health.set(self.calculate_health_score());
    }

    /// Get current metrics snapshot
    pub fn get_metrics(&self) -> NotifierMetrics {
        self.update_health_score();

        NotifierMetrics {
            updates_total: self.updates_total.get(),
            updates_rejected_total: self.updates_rejected_total.get(),
            instruments_active: self.instruments_active.get(),
            registrations_total: self.registrations_total.get(),
            removals_total: self.removals_total.get(),
            deliveries_scheduled_total: self.deliveries_scheduled_total.get(),
            deliveries_succeeded_total: self.deliveries_succeeded_total.get(),
            deliveries_failed_total: self.deliveries_failed_total.get(),
            deliveries_in_flight: self.deliveries_in_flight.get(),
            delivery_latency_p50_us: self.delivery_latency.percentile(50.0),
            delivery_latency_p95_us: self.delivery_latency.percentile(95.0),
            delivery_latency_p99_us: self.delivery_latency.percentile(99.0),
            system_health: self.system_health.get(),
            uptime_seconds: self.uptime().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe atomic counter
#[derive(Debug)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
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

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe atomic gauge
#[derive(Debug)]
pub struct AtomicGauge {
    value: AtomicU64,
}

impl AtomicGauge {
    pub fn new() -> Self {
        Self { value: AtomicU64::new(0) }
    }

    pub fn set(&self, value: u64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Default for AtomicGauge {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe atomic histogram for latency tracking
#[derive(Debug)]
pub struct AtomicHistogram {
    buckets: Vec<AtomicU64>,
    bucket_size: u64,
    max_value: u64,
}

impl AtomicHistogram {
    pub fn new() -> Self {
        Self::with_buckets(1000, 100) // 1000 buckets, 100us each = 100ms max
    }

    pub fn with_buckets(bucket_count: usize, bucket_size: u64) -> Self {
        let buckets = (0..bucket_count).map(|_| AtomicU64::new(0)).collect();

        Self { buckets, bucket_size, max_value: (bucket_count as u64) * bucket_size }
    }

    pub fn record(&self, value: u64) {
        let bucket_index = if value >= self.max_value {
            self.buckets.len() - 1
        } else {
            (value / self.bucket_size) as usize
        };

        if let Some(bucket) = self.buckets.get(bucket_index) {
            bucket.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_bucket(&self, index: usize) -> u64 {
        self.buckets.get(index).map(|bucket| bucket.load(Ordering::Relaxed)).unwrap_or(0)
    }

    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(|bucket| bucket.load(Ordering::Relaxed)).sum()
    }

    pub fn percentile(&self, p: f64) -> u64 {
        let total = self.total_count();
        if total == 0 {
            return 0;
        }

        let target = (total as f64 * p / 100.0) as u64;
        let mut count = 0;

        for (i, bucket) in self.buckets.iter().enumerate() {
            count += bucket.load(Ordering::Relaxed);
            if count >= target {
                if p >= 100.0 {
                    return self.max_value;
                }
                return (i as u64) * self.bucket_size;
            }
        }

        self.max_value
    }
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics for monitoring
#[derive(Debug, Clone)]
pub struct NotifierMetrics {
    pub updates_total: u64,
    pub updates_rejected_total: u64,
    pub instruments_active: u64,
    pub registrations_total: u64,
    pub removals_total: u64,
    pub deliveries_scheduled_total: u64,
    pub deliveries_succeeded_total: u64,
    pub deliveries_failed_total: u64,
    pub deliveries_in_flight: u64,
    pub delivery_latency_p50_us: u64,
    pub delivery_latency_p95_us: u64,
    pub delivery_latency_p99_us: u64,
    pub system_health: u64,
    pub uptime_seconds: u64,
}
