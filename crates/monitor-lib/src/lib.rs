//! Core library for fleet resource monitoring
//!
//! This crate provides the core functionality for:
//! - Time-ordered sample storage with bounded retention
//! - Threshold evaluation and breach history
//! - Fleet-wide aggregation and chart projection
//! - Live/manual refresh scheduling
//! - CSV and JSON export
//! - Health checks and observability

pub mod aggregate;
pub mod alerting;
pub mod chart;
pub mod error;
pub mod export;
pub mod health;
pub mod memo;
pub mod models;
pub mod observability;
pub mod refresh;
pub mod session;
pub mod source;
pub mod store;

pub use error::{MonitorError, Result};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
pub use refresh::{RefreshInterval, RefreshMode, RefreshScheduler, SchedulerStatus, TickReport};
pub use session::{DerivedViews, MonitorSession, SelectionUpdate, ViewSelection};
