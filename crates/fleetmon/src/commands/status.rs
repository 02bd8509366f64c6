//! Fleet snapshot and view selection commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, Scope, Selection, SelectionUpdate, SnapshotResponse};
use crate::output::{color_status, format_age, format_timestamp, print_success, OutputFormat};

/// Row for the entity table
#[derive(Tabled, serde::Serialize)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Monitored")]
    monitored: String,
    #[tabled(rename = "Health")]
    health: String,
}

/// Show the aggregated snapshot, the current selection and every entity
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: SnapshotResponse = client.get("api/v1/snapshot").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&response)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            let snapshot = &response.snapshot;

            println!("{}", "Fleet Snapshot".bold());
            println!("{}", "=".repeat(50));
            print_selection(&response.selection);

            let refresh = &response.refresh;
            println!(
                "Refresh:                {} every {}s ({} ticks, {} errors)",
                color_status(&refresh.mode),
                refresh.interval_secs,
                refresh.ticks,
                refresh.tick_errors
            );
            if let Some(at) = &response.last_refresh_at {
                println!(
                    "Last refresh:           {} ({})",
                    format_timestamp(at),
                    format_age(at, chrono::Utc::now())
                );
            }
            println!();

            println!("{}", "Fleet Means".bold());
            println!("{}", "-".repeat(50));
            println!("Active entities:        {}", snapshot.active_entity_count);
            println!("CPU:                    {:.1}%", snapshot.mean_cpu);
            println!("Memory:                 {:.1}%", snapshot.mean_memory);
            println!("Disk:                   {:.1}%", snapshot.mean_disk);
            println!("Network:                {:.1} MB/s", snapshot.mean_network);
            println!("Response time:          {:.1} ms", snapshot.mean_response_time);
            println!("Error rate:             {:.2}%", snapshot.mean_error_rate);
            println!("Requests:               {}", snapshot.total_requests);

            let alerts = snapshot.open_alert_count.to_string();
            if snapshot.open_alert_count > 0 {
                println!("Open alerts:            {}", alerts.red().bold());
            } else {
                println!("Open alerts:            {}", alerts.green());
            }
            println!();

            let rows: Vec<EntityRow> = response
                .entities
                .iter()
                .map(|e| EntityRow {
                    id: e.id.clone(),
                    name: e.display_name.clone(),
                    category: e.category.clone(),
                    monitored: if e.is_monitored { "yes" } else { "no" }.to_string(),
                    health: color_status(&e.health_status),
                })
                .collect();
            crate::output::print_table(&rows, format);
        }
    }

    Ok(())
}

fn print_selection(selection: &Selection) {
    println!("Scope:                  {}", selection.scope.label().cyan());
    println!("Window:                 {}", selection.window);
    println!("Metric:                 {}", selection.metric);
}

/// Build the selection update sent to the agent
fn selection_update(
    entity: Option<String>,
    all: bool,
    window: Option<String>,
    metric: Option<String>,
) -> SelectionUpdate {
    let scope = match (entity, all) {
        (Some(id), _) => Some(Scope {
            kind: "entity".to_string(),
            entity_id: Some(id),
        }),
        (None, true) => Some(Scope {
            kind: "all".to_string(),
            entity_id: None,
        }),
        (None, false) => None,
    };

    SelectionUpdate {
        scope,
        window,
        metric,
    }
}

/// Change the scope, window or metric the agent computes views for
pub async fn select(
    client: &ApiClient,
    entity: Option<String>,
    all: bool,
    window: Option<String>,
    metric: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let update = selection_update(entity, all, window, metric);
    let selection: Selection = client.put("api/v1/selection", &update).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&selection)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            print_success("Selection updated");
            print_selection(&selection);
        }
    }

    Ok(())
}
