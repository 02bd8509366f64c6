//! Agent configuration

use std::collections::HashMap;

use anyhow::{Context, Result};
use monitor_lib::alerting::ThresholdStore;
use monitor_lib::store::StoreConfig;
use monitor_lib::{Entity, MetricKey, RefreshInterval, RefreshMode};
use serde::Deserialize;

/// Optional per-metric override of the stock thresholds
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdOverride {
    pub warning: Option<f64>,
    pub critical: Option<f64>,
    pub enabled: Option<bool>,
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// `live` or `manual`
    #[serde(default = "default_refresh_mode")]
    pub refresh_mode: String,

    /// One of 1, 2, 5, 10, 30
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Seed for the synthetic metric source
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// History generated at start-up so charts are populated
    #[serde(default = "default_backfill_hours")]
    pub backfill_hours: i64,

    #[serde(default = "default_backfill_step")]
    pub backfill_step_secs: i64,

    /// Minimum gap between two samples of one entity
    #[serde(default)]
    pub min_spacing_ms: i64,

    /// Monitored entities as `id` or `id=Display Name`
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,

    /// Keyed by metric name, e.g. `[thresholds.cpu]` in monitor.toml
    #[serde(default)]
    pub thresholds: HashMap<String, ThresholdOverride>,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "fleet-monitor".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_refresh_mode() -> String {
    "live".to_string()
}

fn default_refresh_interval() -> u64 {
    5
}

fn default_seed() -> u64 {
    42
}

fn default_backfill_hours() -> i64 {
    24
}

fn default_backfill_step() -> i64 {
    300
}

fn default_entities() -> Vec<String> {
    [
        "api-gateway=API Gateway",
        "checkout=Checkout Service",
        "payments=Payments",
        "search=Search",
        "inventory=Inventory DB",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            refresh_mode: default_refresh_mode(),
            refresh_interval_secs: default_refresh_interval(),
            seed: default_seed(),
            backfill_hours: default_backfill_hours(),
            backfill_step_secs: default_backfill_step(),
            min_spacing_ms: 0,
            entities: default_entities(),
            thresholds: HashMap::new(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `monitor.toml` (optional) and `MONITOR_*`
    /// environment variables, the latter taking precedence
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("monitor").required(false))
            .add_source(
                config::Environment::with_prefix("MONITOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("entities"),
            )
            .build()?;

        config
            .try_deserialize()
            .context("Invalid monitor configuration")
    }

    pub fn refresh_mode(&self) -> Result<RefreshMode> {
        Ok(self.refresh_mode.parse()?)
    }

    pub fn refresh_interval(&self) -> Result<RefreshInterval> {
        Ok(RefreshInterval::try_from(self.refresh_interval_secs)?)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            min_spacing: chrono::Duration::milliseconds(self.min_spacing_ms.max(0)),
            ..StoreConfig::default()
        }
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.entities
            .iter()
            .map(|entry| entry.trim())
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((id, name)) => Entity::new(id.trim(), name.trim(), "service"),
                None => Entity::new(entry, entry, "service"),
            })
            .collect()
    }

    /// Stock thresholds with configured overrides applied
    pub fn threshold_store(&self) -> Result<ThresholdStore> {
        let mut store = ThresholdStore::with_defaults();

        for (name, over) in &self.thresholds {
            let metric: MetricKey = name
                .parse()
                .with_context(|| format!("Unknown metric in threshold override: {name}"))?;
            let current = store
                .get(metric)
                .cloned()
                .with_context(|| format!("No stock threshold for {metric}"))?;

            store.update_limits(
                metric,
                over.warning.unwrap_or(current.warning_threshold),
                over.critical.unwrap_or(current.critical_threshold),
            )?;
            if let Some(enabled) = over.enabled {
                store.set_enabled(metric, enabled)?;
            }
        }

        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.api_port, 8080);
        assert_eq!(config.refresh_mode().unwrap(), RefreshMode::Live);
        assert_eq!(config.refresh_interval().unwrap(), RefreshInterval::FiveSeconds);
        assert_eq!(config.entities().len(), 5);
    }

    #[test]
    fn test_load_reads_prefixed_environment() {
        let vars = [
            ("MONITOR_API_PORT", "9999"),
            ("MONITOR_REFRESH_INTERVAL_SECS", "10"),
            ("MONITOR_REFRESH_MODE", "manual"),
            ("MONITOR_SEED", "7"),
            ("MONITOR_THRESHOLDS__CPU__CRITICAL", "95"),
        ];
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let loaded = AgentConfig::load();
        for (key, _) in vars {
            std::env::remove_var(key);
        }
        let config = loaded.unwrap();

        assert_eq!(config.api_port, 9999);
        assert_eq!(config.refresh_interval().unwrap(), RefreshInterval::TenSeconds);
        assert_eq!(config.refresh_mode().unwrap(), RefreshMode::Manual);
        assert_eq!(config.seed, 7);
        assert_eq!(config.thresholds["cpu"].critical, Some(95.0));
    }

    #[test]
    fn test_entity_specs() {
        let config = AgentConfig {
            entities: vec!["web=Web Frontend".into(), " db ".into(), "".into()],
            ..AgentConfig::default()
        };
        let entities = config.entities();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].id, "web");
        assert_eq!(entities[0].display_name, "Web Frontend");
        assert_eq!(entities[1].id, "db");
        assert_eq!(entities[1].display_name, "db");
    }

    #[test]
    fn test_threshold_overrides() {
        let mut config = AgentConfig::default();
        config.thresholds.insert(
            "cpu".into(),
            ThresholdOverride {
                critical: Some(80.0),
                ..Default::default()
            },
        );
        config.thresholds.insert(
            "activeConnections".into(),
            ThresholdOverride {
                enabled: Some(true),
                ..Default::default()
            },
        );

        let store = config.threshold_store().unwrap();
        let cpu = store.get(MetricKey::Cpu).unwrap();
        assert_eq!(cpu.warning_threshold, 70.0);
        assert_eq!(cpu.critical_threshold, 80.0);
        assert_eq!(store.effective_critical(MetricKey::ActiveConnections), Some(1000.0));
    }

    #[test]
    fn test_bad_values_are_reported() {
        let mut config = AgentConfig {
            refresh_interval_secs: 3,
            refresh_mode: "paused".into(),
            ..AgentConfig::default()
        };
        assert!(config.refresh_interval().is_err());
        assert!(config.refresh_mode().is_err());

        config.thresholds.insert("latency".into(), ThresholdOverride::default());
        assert!(config.threshold_store().is_err());
    }
}
