//! Sink metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::DeliveryRecorder;

/// In-process counters for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Records accepted by the destination
    delivered_count: AtomicU64,
    /// Records that failed delivery
    failure_count: AtomicU64,
    /// Records shed under backpressure
    skipped_count: AtomicU64,
    /// Successful delivery calls
    latency_samples: AtomicU64,
    /// Sum of delivery latency in microseconds
    latency_total_us: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get delivered count
    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Get skipped count
    pub fn skipped_count(&self) -> u64 {
        self.skipped_count.load(Ordering::Relaxed)
    }

    /// Mean latency of successful delivery calls
    pub fn mean_latency(&self) -> Option<Duration> {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return None;
        }
        let total = self.latency_total_us.load(Ordering::Relaxed);
        Some(Duration::from_micros(total / samples))
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            delivered_count: self.delivered_count(),
            failure_count: self.failure_count(),
            skipped_count: self.skipped_count(),
            deliveries: self.latency_samples.load(Ordering::Relaxed),
            mean_latency: self.mean_latency(),
        }
    }
}

impl DeliveryRecorder for SinkMetrics {
    fn record_delivered(&self, count: u64) {
        self.delivered_count.fetch_add(count, Ordering::Relaxed);
    }

    fn record_failed(&self, count: u64) {
        self.failure_count.fetch_add(count, Ordering::Relaxed);
    }

    fn record_skipped(&self, count: u64) {
        self.skipped_count.fetch_add(count, Ordering::Relaxed);
    }

    fn record_latency(&self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
        self.latency_total_us.fetch_add(micros, Ordering::Relaxed);
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub delivered_count: u64,
    pub failure_count: u64,
    pub skipped_count: u64,
    pub deliveries: u64,
    pub mean_latency: Option<Duration>,
}

/// Forwards every record to each inner recorder
#[derive(Clone, Default)]
pub struct CompositeRecorder {
    inner: Vec<Arc<dyn DeliveryRecorder>>,
}

impl CompositeRecorder {
    pub fn new(inner: Vec<Arc<dyn DeliveryRecorder>>) -> Self {
        Self { inner }
    }

    pub fn push(&mut self, recorder: Arc<dyn DeliveryRecorder>) {
        self.inner.push(recorder);
    }
}

impl DeliveryRecorder for CompositeRecorder {
    fn record_delivered(&self, count: u64) {
        self.inner.iter().for_each(|r| r.record_delivered(count));
    }

    fn record_failed(&self, count: u64) {
        self.inner.iter().for_each(|r| r.record_failed(count));
    }

    fn record_skipped(&self, count: u64) {
        self.inner.iter().for_each(|r| r.record_skipped(count));
    }

    fn record_latency(&self, latency: Duration) {
        self.inner.iter().for_each(|r| r.record_latency(latency));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = SinkMetrics::new();
        metrics.record_delivered(3);
        metrics.record_failed(1);
        metrics.record_skipped(2);
        metrics.record_latency(Duration::from_millis(10));
        metrics.record_latency(Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delivered_count, 3);
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.skipped_count, 2);
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.mean_latency, Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_composite_fans_out() {
        let a = Arc::new(SinkMetrics::new());
        let b = Arc::new(SinkMetrics::new());
        let composite =
            CompositeRecorder::new(vec![a.clone() as Arc<dyn DeliveryRecorder>, b.clone()]);
        composite.record_delivered(5);
        composite.record_skipped(1);
        assert_eq!(a.delivered_count(), 5);
        assert_eq!(b.delivered_count(), 5);
        assert_eq!(b.skipped_count(), 1);
    }
}
