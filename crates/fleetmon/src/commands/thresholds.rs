//! Threshold commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ThresholdConfig, ThresholdUpdate};
use crate::output::{format_value, print_success, print_table, print_warning, OutputFormat};

/// Row for the threshold table
#[derive(Tabled, serde::Serialize)]
struct ThresholdRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Warning")]
    warning: String,
    #[tabled(rename = "Critical")]
    critical: String,
    #[tabled(rename = "Enabled")]
    enabled: String,
}

impl From<&ThresholdConfig> for ThresholdRow {
    fn from(config: &ThresholdConfig) -> Self {
        Self {
            metric: config.metric_key.clone(),
            warning: format_value(config.warning_threshold, &config.unit),
            critical: format_value(config.critical_threshold, &config.unit),
            enabled: if config.enabled { "yes" } else { "no" }.to_string(),
        }
    }
}

/// List every metric's threshold
pub async fn list_thresholds(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let configs: Vec<ThresholdConfig> = client.get("api/v1/thresholds").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&configs)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let rows: Vec<ThresholdRow> = configs.iter().map(ThresholdRow::from).collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

/// Update one metric's threshold; omitted fields keep their current value
pub async fn set_threshold(
    client: &ApiClient,
    metric: &str,
    warning: Option<f64>,
    critical: Option<f64>,
    enabled: Option<bool>,
    format: OutputFormat,
) -> Result<()> {
    if warning.is_none() && critical.is_none() && enabled.is_none() {
        print_warning("Nothing to change; pass --warning, --critical, --enable or --disable");
        return Ok(());
    }

    let update = ThresholdUpdate {
        warning_threshold: warning,
        critical_threshold: critical,
        enabled,
    };
    let path = format!("api/v1/thresholds/{}", metric);
    let config: ThresholdConfig = client.put(&path, &update).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            print_success(&format!("Threshold for {} updated", config.metric_key));
            print_table(&[ThresholdRow::from(&config)], format);
        }
    }

    Ok(())
}
