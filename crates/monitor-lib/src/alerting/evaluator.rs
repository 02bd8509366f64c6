//! Threshold banding
//!
//! Classifies a raw value against the critical limit of its metric.
//! Values at or above the limit are critical; values within the
//! approach band (85% of critical and up) are a warning. The configured
//! `warning_threshold` is display-only and not consulted here.

use serde::{Deserialize, Serialize};

use super::ThresholdStore;
use crate::models::{MetricKey, ThresholdConfig};

/// Fraction of the critical limit where the warning band starts
pub const APPROACH_RATIO: f64 = 0.85;

/// Normal/warning/critical classification of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdBand {
    Normal,
    Warning,
    Critical,
}

impl std::fmt::Display for ThresholdBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThresholdBand::Normal => write!(f, "normal"),
            ThresholdBand::Warning => write!(f, "warning"),
            ThresholdBand::Critical => write!(f, "critical"),
        }
    }
}

/// Band a value against a single threshold definition
pub fn classify_value(config: &ThresholdConfig, value: f64) -> ThresholdBand {
    match config.effective_critical() {
        Some(critical) => band_for(value, critical),
        None => ThresholdBand::Normal,
    }
}

/// `critical` is always positive here; comparing the ratio keeps exact
/// boundaries such as 85.0 / 100.0 from drifting under float rounding.
fn band_for(value: f64, critical: f64) -> ThresholdBand {
    if value >= critical {
        ThresholdBand::Critical
    } else if value / critical >= APPROACH_RATIO {
        ThresholdBand::Warning
    } else {
        ThresholdBand::Normal
    }
}

/// Read-only evaluator over the current threshold configuration
#[derive(Debug, Clone, Copy)]
pub struct ThresholdEvaluator<'a> {
    thresholds: &'a ThresholdStore,
}

impl<'a> ThresholdEvaluator<'a> {
    pub fn new(thresholds: &'a ThresholdStore) -> Self {
        Self { thresholds }
    }

    /// Classify a value for a metric.
    ///
    /// Metrics without a threshold, disabled thresholds and thresholds
    /// with a non-positive critical limit always classify as normal.
    pub fn classify(&self, metric: MetricKey, value: f64) -> ThresholdBand {
        match self.thresholds.effective_critical(metric) {
            Some(critical) => band_for(value, critical),
            None => ThresholdBand::Normal,
        }
    }

    /// Worst band across every metric present on a sample
    pub fn worst_band(&self, sample: &crate::models::Sample) -> ThresholdBand {
        MetricKey::ALL
            .iter()
            .filter_map(|&metric| sample.value(metric).map(|v| self.classify(metric, v)))
            .max()
            .unwrap_or(ThresholdBand::Normal)
    }
}
