//! Observability infrastructure for the monitor
//!
//! Provides:
//! - Prometheus metrics (tick latency, sample throughput, open alerts)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{AlertEvent, AlertSeverity, MetricKey};
use crate::refresh::RefreshMode;

/// Histogram buckets for tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    tick_latency_seconds: Histogram,
    ticks: IntCounter,
    tick_errors: IntCounter,
    samples_appended: IntCounter,
    samples_rejected: IntCounter,
    monitored_entities: IntGauge,
    open_alerts: IntGauge,
    stored_samples: IntGauge,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            tick_latency_seconds: register_histogram!(
                "fleet_monitor_tick_latency_seconds",
                "Time spent appending samples and recomputing derived views",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register tick_latency_seconds"),

            ticks: register_int_counter!(
                "fleet_monitor_ticks_total",
                "Total number of completed refresh ticks"
            )
            .expect("Failed to register ticks_total"),

            tick_errors: register_int_counter!(
                "fleet_monitor_tick_errors_total",
                "Total number of failed refresh ticks"
            )
            .expect("Failed to register tick_errors_total"),

            samples_appended: register_int_counter!(
                "fleet_monitor_samples_appended_total",
                "Total number of samples accepted by the metric store"
            )
            .expect("Failed to register samples_appended_total"),

            samples_rejected: register_int_counter!(
                "fleet_monitor_samples_rejected_total",
                "Total number of samples rejected as out of order"
            )
            .expect("Failed to register samples_rejected_total"),

            monitored_entities: register_int_gauge!(
                "fleet_monitor_monitored_entities",
                "Number of entities currently monitored"
            )
            .expect("Failed to register monitored_entities"),

            open_alerts: register_int_gauge!(
                "fleet_monitor_open_alerts",
                "Metrics currently in the critical band across the fleet"
            )
            .expect("Failed to register open_alerts"),

            stored_samples: register_int_gauge!(
                "fleet_monitor_stored_samples",
                "Samples held by the metric store after retention"
            )
            .expect("Failed to register stored_samples"),
        }
    }
}

/// Handle to the global monitor metrics.
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn observe_tick_latency(&self, duration_secs: f64) {
        self.inner().tick_latency_seconds.observe(duration_secs);
    }

    pub fn inc_ticks(&self) {
        self.inner().ticks.inc();
    }

    pub fn inc_tick_errors(&self) {
        self.inner().tick_errors.inc();
    }

    pub fn add_samples_appended(&self, n: usize) {
        self.inner().samples_appended.inc_by(n as u64);
    }

    pub fn add_samples_rejected(&self, n: usize) {
        self.inner().samples_rejected.inc_by(n as u64);
    }

    pub fn set_monitored_entities(&self, count: usize) {
        self.inner().monitored_entities.set(count as i64);
    }

    pub fn set_open_alerts(&self, count: usize) {
        self.inner().open_alerts.set(count as i64);
    }

    pub fn set_stored_samples(&self, count: usize) {
        self.inner().stored_samples.set(count as i64);
    }
}

/// Structured logger for monitor events
///
/// Every event carries a stable `event` field so log pipelines can filter
/// on it without parsing messages.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_session_started(&self, version: &str, entities: usize, mode: RefreshMode) {
        info!(
            event = "session_started",
            instance = %self.instance,
            version = %version,
            entities = entities,
            mode = %mode,
            "Monitoring session started"
        );
    }

    pub fn log_refresh_tick(
        &self,
        appended: usize,
        rejected: usize,
        open_alerts: usize,
        elapsed_ms: u128,
    ) {
        info!(
            event = "refresh_tick",
            instance = %self.instance,
            appended = appended,
            rejected = rejected,
            open_alerts = open_alerts,
            elapsed_ms = elapsed_ms,
            "Refresh tick complete"
        );
    }

    pub fn log_sample_rejected(&self, entity_id: &str, reason: &str) {
        warn!(
            event = "sample_rejected",
            instance = %self.instance,
            entity_id = %entity_id,
            reason = %reason,
            "Sample rejected by metric store"
        );
    }

    /// Log a newly observed breach
    pub fn log_breach(&self, breach: &AlertEvent) {
        match breach.severity {
            AlertSeverity::Critical => {
                warn!(
                    event = "breach_detected",
                    instance = %self.instance,
                    entity_id = %breach.entity_id,
                    metric = %breach.metric_key,
                    value = breach.value,
                    threshold = breach.threshold,
                    severity = %breach.severity,
                    "Critical threshold breach"
                );
            }
            AlertSeverity::Warning => {
                info!(
                    event = "breach_detected",
                    instance = %self.instance,
                    entity_id = %breach.entity_id,
                    metric = %breach.metric_key,
                    value = breach.value,
                    threshold = breach.threshold,
                    severity = %breach.severity,
                    "Threshold breach"
                );
            }
        }
    }

    pub fn log_mode_changed(&self, mode: RefreshMode, interval_secs: u64) {
        info!(
            event = "refresh_mode_changed",
            instance = %self.instance,
            mode = %mode,
            interval_secs = interval_secs,
            "Refresh mode changed"
        );
    }

    pub fn log_thresholds_updated(
        &self,
        metric: MetricKey,
        warning: f64,
        critical: f64,
        enabled: bool,
    ) {
        info!(
            event = "thresholds_updated",
            instance = %self.instance,
            metric = %metric,
            warning = warning,
            critical = critical,
            enabled = enabled,
            "Threshold configuration updated"
        );
    }

    pub fn log_export(&self, filename: &str, bytes: usize) {
        info!(
            event = "export_generated",
            instance = %self.instance,
            filename = %filename,
            bytes = bytes,
            "Export generated"
        );
    }

    pub fn log_session_closed(&self, reason: &str) {
        info!(
            event = "session_closed",
            instance = %self.instance,
            reason = %reason,
            "Monitoring session closed"
        );
    }
}
