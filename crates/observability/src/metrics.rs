//! Relay 指标收集模块
//!
//! 每个 sink 持有一个 `PrometheusRecorder`，通过 `metrics` facade 上报投递结果。

use std::time::Duration;

use contracts::DeliveryRecorder;
use metrics::{counter, histogram, Counter, Histogram};

/// 按 sink 标签上报的投递指标
#[derive(Clone)]
pub struct PrometheusRecorder {
    delivered: Counter,
    failed: Counter,
    skipped: Counter,
    latency: Histogram,
}

impl PrometheusRecorder {
    /// 注册 sink 对应的指标句柄
    pub fn new(sink: &str) -> Self {
        let sink = sink.to_string();
        Self {
            delivered: counter!("relay_delivery_success_total", "sink" => sink.clone()),
            failed: counter!("relay_delivery_failure_total", "sink" => sink.clone()),
            skipped: counter!("relay_delivery_skipped_total", "sink" => sink.clone()),
            latency: histogram!("relay_delivery_latency_seconds", "sink" => sink),
        }
    }
}

impl std::fmt::Debug for PrometheusRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRecorder").finish_non_exhaustive()
    }
}

impl DeliveryRecorder for PrometheusRecorder {
    fn record_delivered(&self, count: u64) {
        self.delivered.increment(count);
    }

    fn record_failed(&self, count: u64) {
        self.failed.increment(count);
    }

    fn record_skipped(&self, count: u64) {
        self.skipped.increment(count);
    }

    fn record_latency(&self, latency: Duration) {
        self.latency.record(latency.as_secs_f64());
    }
}

/// 记录一次入站提交的结果 (按路由与状态码)
pub fn record_submission(route: &str, status: u16) {
    counter!(
        "relay_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
