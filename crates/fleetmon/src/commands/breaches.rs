//! Breach history command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{AlertEvent, ApiClient};
use crate::output::{color_status, format_timestamp, print_info, print_table, OutputFormat};

/// Row for the breach table
#[derive(Tabled, serde::Serialize)]
struct BreachRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "State")]
    state: String,
}

impl From<&AlertEvent> for BreachRow {
    fn from(event: &AlertEvent) -> Self {
        Self {
            time: format_timestamp(&event.timestamp),
            entity: event.entity_id.clone(),
            metric: event.metric_key.clone(),
            value: format!("{:.2}", event.value),
            threshold: format!("{:.2}", event.threshold),
            severity: color_status(&event.severity),
            state: if event.resolved { "resolved" } else { "open" }.to_string(),
        }
    }
}

/// Show recent breaches for the current selection, newest first
pub async fn show_breaches(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let events: Vec<AlertEvent> = client.get("api/v1/breaches").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&events)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if events.is_empty() {
                print_info("No threshold breaches in the selected window");
                return Ok(());
            }
            let rows: Vec<BreachRow> = events.iter().map(BreachRow::from).collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}
