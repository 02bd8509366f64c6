//! Refresh control commands

use anyhow::Result;

use crate::client::{ApiClient, RefreshStatus, RefreshUpdate, TickReport};
use crate::output::{color_status, format_timestamp, print_success, print_warning, OutputFormat};

/// Switch the agent between live and manual refresh
pub async fn set_mode(
    client: &ApiClient,
    mode: &str,
    interval_secs: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    let update = RefreshUpdate {
        mode: Some(mode.to_string()),
        interval_secs,
    };
    let status: RefreshStatus = client.put("api/v1/refresh", &update).await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&status)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            if interval_secs.is_some_and(|secs| secs != status.interval_secs) {
                print_warning(&format!(
                    "Interval not accepted; agent keeps {}s",
                    status.interval_secs
                ));
            }
            print_success(&format!(
                "Refresh mode is {} (every {}s)",
                color_status(&status.mode),
                status.interval_secs
            ));
        }
    }

    Ok(())
}

/// Run one refresh tick on the agent
pub async fn refresh_now(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let report: TickReport = client.post("api/v1/refresh/tick").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Refreshed at {}: {} appended, {} rejected, {} missing",
                format_timestamp(&report.at),
                report.appended,
                report.rejected,
                report.missing
            ));
            if report.open_alerts > 0 {
                print_warning(&format!("{} open alerts", report.open_alerts));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_mode_sends_interval() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/v1/refresh")
            .match_body(mockito::Matcher::Json(
                serde_json::json!({ "mode": "live", "intervalSecs": 10 }),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"mode":"live","intervalSecs":10,"lastRefreshAt":null,"ticks":1,"tickErrors":0,"consecutiveErrors":0}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        set_mode(&client, "live", Some(10), OutputFormat::Table)
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_now_propagates_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/refresh/tick")
            .with_status(500)
            .with_body(r#"{"error":"serialization error: boom"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = refresh_now(&client, OutputFormat::Table).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
