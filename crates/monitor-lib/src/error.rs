//! Error types for the telemetry core

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors surfaced by the metric store, configuration parsing and exports
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A sample landed before (or too close after) the entity's last sample
    #[error("out-of-order sample for {entity_id}: {timestamp} after {last_timestamp}")]
    OutOfOrderSample {
        entity_id: String,
        timestamp: DateTime<Utc>,
        last_timestamp: DateTime<Utc>,
    },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    /// Export was requested for an empty data set
    #[error("nothing to export")]
    NothingToExport,

    #[error("invalid refresh interval: {0} (expected one of 1s, 2s, 5s, 10s, 30s)")]
    InvalidInterval(String),

    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("unknown time window: {0} (expected one of 1h, 24h, 7d, 30d)")]
    UnknownWindow(String),

    #[error("invalid viewport: {0}")]
    InvalidViewport(String),

    #[error("unknown refresh mode: {0}")]
    UnknownMode(String),

    #[error("unsupported export format: {0} (expected csv or json)")]
    UnknownFormat(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MonitorError {
    fn from(err: serde_json::Error) -> Self {
        MonitorError::Serialization(err.to_string())
    }
}

impl From<csv::Error> for MonitorError {
    fn from(err: csv::Error) -> Self {
        MonitorError::Serialization(err.to_string())
    }
}
