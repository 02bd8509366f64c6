//! Per-metric threshold configuration store

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MonitorError, Result};
use crate::models::{MetricKey, ThresholdConfig};

/// Partial edit of a threshold, as pushed back by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ThresholdUpdate {
    fn apply(self, config: &mut ThresholdConfig) {
        if let Some(warning) = self.warning_threshold {
            config.warning_threshold = warning;
        }
        if let Some(critical) = self.critical_threshold {
            config.critical_threshold = critical;
        }
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(unit) = self.unit {
            config.unit = unit;
        }
    }
}

/// Mutable threshold definitions keyed by metric
///
/// Every mutation bumps `revision`, which derived-view caches use to
/// notice configuration changes.
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    configs: BTreeMap<MetricKey, ThresholdConfig>,
    revision: u64,
}

impl Default for ThresholdStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ThresholdStore {
    /// An empty store: every metric evaluates as normal
    pub fn empty() -> Self {
        Self {
            configs: BTreeMap::new(),
            revision: 0,
        }
    }

    /// Store pre-populated with the stock dashboard limits
    pub fn with_defaults() -> Self {
        let mut store = Self::empty();
        for config in default_thresholds() {
            store.configs.insert(config.metric_key, config);
        }
        store
    }

    pub fn from_configs(configs: impl IntoIterator<Item = ThresholdConfig>) -> Self {
        let mut store = Self::empty();
        for config in configs {
            store.configs.insert(config.metric_key, config);
        }
        store
    }

    pub fn get(&self, metric: MetricKey) -> Option<&ThresholdConfig> {
        self.configs.get(&metric)
    }

    /// All thresholds in metric order
    pub fn list(&self) -> Vec<ThresholdConfig> {
        self.configs.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThresholdConfig> {
        self.configs.values()
    }

    /// Thresholds that take part in evaluation, paired with their critical limit
    pub fn active(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        self.configs
            .values()
            .filter_map(|c| c.effective_critical().map(|t| (c.metric_key, t)))
    }

    pub fn effective_critical(&self, metric: MetricKey) -> Option<f64> {
        self.get(metric).and_then(ThresholdConfig::effective_critical)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Insert or replace a threshold, returning the previous definition
    pub fn upsert(&mut self, config: ThresholdConfig) -> Option<ThresholdConfig> {
        check_ordering(&config);
        info!(
            metric = %config.metric_key,
            warning = config.warning_threshold,
            critical = config.critical_threshold,
            enabled = config.enabled,
            "Threshold updated"
        );
        self.revision += 1;
        self.configs.insert(config.metric_key, config)
    }

    /// Apply a partial edit to an existing threshold
    pub fn update(
        &mut self,
        metric: MetricKey,
        update: ThresholdUpdate,
    ) -> Result<&ThresholdConfig> {
        let mut config = self
            .configs
            .get(&metric)
            .cloned()
            .ok_or_else(|| MonitorError::UnknownMetric(metric.to_string()))?;
        update.apply(&mut config);
        self.upsert(config);
        self.configs
            .get(&metric)
            .ok_or_else(|| MonitorError::UnknownMetric(metric.to_string()))
    }

    pub fn set_enabled(&mut self, metric: MetricKey, enabled: bool) -> Result<()> {
        self.update(
            metric,
            ThresholdUpdate {
                enabled: Some(enabled),
                ..Default::default()
            },
        )
        .map(|_| ())
    }

    pub fn update_limits(&mut self, metric: MetricKey, warning: f64, critical: f64) -> Result<()> {
        self.update(
            metric,
            ThresholdUpdate {
                warning_threshold: Some(warning),
                critical_threshold: Some(critical),
                ..Default::default()
            },
        )
        .map(|_| ())
    }
}

/// Warn about definitions the evaluator will treat oddly; nothing is rejected
fn check_ordering(config: &ThresholdConfig) {
    if config.critical_threshold <= 0.0 {
        warn!(
            metric = %config.metric_key,
            critical = config.critical_threshold,
            "Non-positive critical threshold, evaluation disabled for metric"
        );
    } else if config.warning_threshold >= config.critical_threshold {
        warn!(
            metric = %config.metric_key,
            warning = config.warning_threshold,
            critical = config.critical_threshold,
            "Warning threshold is not below critical threshold"
        );
    }
}

/// Stock limits shipped with the dashboard
pub fn default_thresholds() -> Vec<ThresholdConfig> {
    vec![
        ThresholdConfig::new(MetricKey::Cpu, 70.0, 90.0),
        ThresholdConfig::new(MetricKey::Memory, 75.0, 90.0),
        ThresholdConfig::new(MetricKey::Disk, 80.0, 95.0),
        ThresholdConfig::new(MetricKey::Network, 80.0, 100.0),
        ThresholdConfig::new(MetricKey::ResponseTime, 500.0, 1000.0),
        ThresholdConfig::new(MetricKey::ErrorRate, 2.0, 5.0),
        ThresholdConfig::new(MetricKey::ActiveConnections, 800.0, 1000.0).disabled(),
    ]
}
