//! Core data models for the telemetry core

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// One timestamped measurement tuple for a monitored entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
    /// CPU utilisation in percent
    pub cpu: f64,
    /// Memory utilisation in percent
    pub memory: f64,
    /// Disk utilisation in percent
    pub disk: f64,
    /// Network throughput in MB/s
    pub network: f64,
    /// Mean response time in milliseconds
    pub response_time: f64,
    /// Requests served since the previous sample
    #[serde(default)]
    pub request_count: u64,
    /// Error rate in percent
    pub error_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_connections: Option<u32>,
}

impl Sample {
    /// Read a single metric off the sample.
    ///
    /// Returns `None` only when the metric is optional and was not recorded.
    pub fn value(&self, metric: MetricKey) -> Option<f64> {
        match metric {
            MetricKey::Cpu => Some(self.cpu),
            MetricKey::Memory => Some(self.memory),
            MetricKey::Disk => Some(self.disk),
            MetricKey::Network => Some(self.network),
            MetricKey::ResponseTime => Some(self.response_time),
            MetricKey::ErrorRate => Some(self.error_rate),
            MetricKey::ActiveConnections => self.active_connections.map(f64::from),
        }
    }
}

/// Metric kinds carried by a [`Sample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKey {
    Cpu,
    Memory,
    Disk,
    Network,
    ResponseTime,
    ErrorRate,
    ActiveConnections,
}

impl MetricKey {
    pub const ALL: [MetricKey; 7] = [
        MetricKey::Cpu,
        MetricKey::Memory,
        MetricKey::Disk,
        MetricKey::Network,
        MetricKey::ResponseTime,
        MetricKey::ErrorRate,
        MetricKey::ActiveConnections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::Cpu => "cpu",
            MetricKey::Memory => "memory",
            MetricKey::Disk => "disk",
            MetricKey::Network => "network",
            MetricKey::ResponseTime => "responseTime",
            MetricKey::ErrorRate => "errorRate",
            MetricKey::ActiveConnections => "activeConnections",
        }
    }

    /// Human-readable label for axes and tables
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::Cpu => "CPU Usage",
            MetricKey::Memory => "Memory Usage",
            MetricKey::Disk => "Disk Usage",
            MetricKey::Network => "Network I/O",
            MetricKey::ResponseTime => "Response Time",
            MetricKey::ErrorRate => "Error Rate",
            MetricKey::ActiveConnections => "Active Connections",
        }
    }

    pub fn default_unit(&self) -> &'static str {
        match self {
            MetricKey::Cpu | MetricKey::Memory | MetricKey::Disk | MetricKey::ErrorRate => "%",
            MetricKey::Network => "MB/s",
            MetricKey::ResponseTime => "ms",
            MetricKey::ActiveConnections => "conn",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "cpu" => Ok(MetricKey::Cpu),
            "memory" | "mem" => Ok(MetricKey::Memory),
            "disk" => Ok(MetricKey::Disk),
            "network" | "net" => Ok(MetricKey::Network),
            "responsetime" => Ok(MetricKey::ResponseTime),
            "errorrate" => Ok(MetricKey::ErrorRate),
            "activeconnections" | "connections" => Ok(MetricKey::ActiveConnections),
            _ => Err(MonitorError::UnknownMetric(s.to_string())),
        }
    }
}

/// Health of a monitored entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Down,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Down => write!(f, "down"),
        }
    }
}

/// A monitored repository or service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub is_monitored: bool,
    #[serde(default)]
    pub health_status: HealthStatus,
}

impl Entity {
    /// Create a monitored, healthy entity
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category: category.into(),
            is_monitored: true,
            health_status: HealthStatus::Healthy,
        }
    }

    pub fn unmonitored(mut self) -> Self {
        self.is_monitored = false;
        self
    }
}

/// Threshold definition for one metric kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub metric_key: MetricKey,
    /// Shown alongside the critical limit; not consulted by the evaluator
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub enabled: bool,
    pub unit: String,
}

impl ThresholdConfig {
    pub fn new(metric_key: MetricKey, warning_threshold: f64, critical_threshold: f64) -> Self {
        Self {
            metric_key,
            warning_threshold,
            critical_threshold,
            enabled: true,
            unit: metric_key.default_unit().to_string(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Critical limit used for evaluation.
    ///
    /// A disabled threshold, or one with a non-positive critical limit,
    /// takes no part in evaluation.
    pub fn effective_critical(&self) -> Option<f64> {
        if self.enabled && self.critical_threshold > 0.0 {
            Some(self.critical_threshold)
        } else {
            None
        }
    }
}

/// Fleet-wide summary derived from the metric store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSnapshot {
    pub active_entity_count: usize,
    pub mean_cpu: f64,
    pub mean_memory: f64,
    pub mean_disk: f64,
    pub mean_network: f64,
    pub mean_response_time: f64,
    pub mean_error_rate: f64,
    pub total_requests: u64,
    pub open_alert_count: usize,
}

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// A discrete threshold breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: String,
    pub entity_id: String,
    pub metric_key: MetricKey,
    pub value: f64,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
}

impl AlertEvent {
    pub fn resolve(&mut self) {
        self.resolved = true;
    }
}

/// How much history a query covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl TimeWindow {
    /// Longest supported window; also the store's retention horizon
    pub const MAX: TimeWindow = TimeWindow::ThirtyDays;

    pub fn duration(&self) -> Duration {
        match self {
            TimeWindow::OneHour => Duration::hours(1),
            TimeWindow::OneDay => Duration::hours(24),
            TimeWindow::SevenDays => Duration::days(7),
            TimeWindow::ThirtyDays => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::OneHour => "1h",
            TimeWindow::OneDay => "24h",
            TimeWindow::SevenDays => "7d",
            TimeWindow::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeWindow {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(TimeWindow::OneHour),
            "24h" | "1d" => Ok(TimeWindow::OneDay),
            "7d" => Ok(TimeWindow::SevenDays),
            "30d" => Ok(TimeWindow::ThirtyDays),
            other => Err(MonitorError::UnknownWindow(other.to_string())),
        }
    }
}

/// Which entities a query covers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "entityId")]
pub enum EntityScope {
    /// Every monitored entity
    #[default]
    All,
    Entity(String),
}

impl EntityScope {
    pub fn entity(id: impl Into<String>) -> Self {
        EntityScope::Entity(id.into())
    }

    /// Label used in export metadata and filenames
    pub fn label(&self) -> &str {
        match self {
            EntityScope::All => "all",
            EntityScope::Entity(id) => id,
        }
    }
}
