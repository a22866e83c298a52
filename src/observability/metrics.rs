use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

use crate::models::TransactionKind;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Global metrics instance.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Metrics collector for the point ledger.
#[derive(Debug, Clone)]
pub struct Metrics;

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_committed(&self, kind: TransactionKind, amount: i64) {
        counter!("point_ledger_operations_total", "kind" => kind.as_str()).increment(1);
        counter!("point_ledger_points_total", "kind" => kind.as_str()).increment(amount.max(0) as u64);
    }

    pub fn record_rejected(&self, operation: &'static str, reason: &'static str) {
        counter!("point_ledger_rejections_total", "operation" => operation, "reason" => reason).increment(1);
    }

    pub fn record_inconsistency(&self, kind: TransactionKind) {
        counter!("point_ledger_inconsistencies_total", "kind" => kind.as_str()).increment(1);
    }

    pub fn record_operation_latency(&self, operation: &'static str, duration_ms: f64) {
        histogram!("point_ledger_operation_duration_ms", "operation" => operation).record(duration_ms);
    }

    pub fn record_lock_wait(&self, duration_ms: f64) {
        histogram!("point_ledger_lock_wait_duration_ms").record(duration_ms);
    }

    pub fn set_active_locks(&self, count: usize) {
        gauge!("point_ledger_active_locks").set(count as f64);
    }
}

/// Timer for measuring operation latency.
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for LatencyTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Initializes the metrics system and returns the Prometheus handle.
pub fn init_metrics() -> PrometheusHandle {
    let handle = METRICS_HANDLE.get_or_init(|| {
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .expect("Failed to install Prometheus recorder");

        describe_metrics();
        handle
    });

    METRICS.get_or_init(Metrics::new);

    handle.clone()
}

/// Describes all metrics for Prometheus.
fn describe_metrics() {
    describe_counter!("point_ledger_operations_total", Unit::Count, "Committed charge and use operations");
    describe_counter!("point_ledger_points_total", Unit::Count, "Points moved by committed operations");
    describe_counter!("point_ledger_rejections_total", Unit::Count, "Operations rejected by validation or lock timeout");
    describe_counter!("point_ledger_inconsistencies_total", Unit::Count, "Balance writes whose history append failed");

    describe_histogram!("point_ledger_operation_duration_ms", Unit::Milliseconds, "Ledger operation latency in milliseconds");
    describe_histogram!("point_ledger_lock_wait_duration_ms", Unit::Milliseconds, "Time spent waiting for an account lock");

    describe_gauge!("point_ledger_active_locks", Unit::Count, "Accounts with a held or awaited lock");
}

/// Returns the global metrics instance.
pub fn get_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
