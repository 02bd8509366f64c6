//! Threshold-based alerting
//!
//! This module provides:
//! - The mutable per-metric threshold store
//! - Banding of raw values into normal/warning/critical
//! - Extraction of discrete breach events from recent samples

mod breaches;
mod evaluator;
mod thresholds;

pub use breaches::{
    extract_breaches, resolve_recovered, DEFAULT_LIMIT, ESCALATION_RATIO, SCAN_WINDOW,
};
pub use evaluator::{classify_value, ThresholdBand, ThresholdEvaluator, APPROACH_RATIO};
pub use thresholds::{default_thresholds, ThresholdStore, ThresholdUpdate};
