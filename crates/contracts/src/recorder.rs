//! Delivery metrics seam
//!
//! Each sink receives its own recorder at construction.

use std::sync::Arc;
use std::time::Duration;

/// Receives per-sink delivery accounting
pub trait DeliveryRecorder: Send + Sync {
    /// Records accepted by the destination
    fn record_delivered(&self, count: u64);

    /// Records that failed delivery
    fn record_failed(&self, count: u64);

    /// Records shed under backpressure
    fn record_skipped(&self, count: u64);

    /// Latency of one successful delivery call
    fn record_latency(&self, latency: Duration);
}

/// Recorder that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl DeliveryRecorder for NoopRecorder {
    fn record_delivered(&self, _count: u64) {}
    fn record_failed(&self, _count: u64) {}
    fn record_skipped(&self, _count: u64) {}
    fn record_latency(&self, _latency: Duration) {}
}

/// Write key -> project id lookup; an empty string means unresolved
pub type ProjectResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;
