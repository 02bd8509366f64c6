//! API client for communicating with the monitor agent

use anyhow::{Context, Result};
use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// API client for the monitor agent
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

/// A file-like response body
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).context("Invalid path")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a POST request without a body
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .post(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;

        check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .client
            .put(self.url(path)?)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        check(response)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    /// GET a text body along with its suggested filename
    pub async fn download(&self, path: &str) -> Result<Download> {
        let response = self
            .client
            .get(self.url(path)?)
            .send()
            .await
            .context("Failed to send request")?;
        let response = check(response).await?;

        let header_str = |name: header::HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let filename = header_str(header::CONTENT_DISPOSITION)
            .as_deref()
            .and_then(attachment_filename);
        let content_type = header_str(header::CONTENT_TYPE);

        let body = response.text().await.context("Failed to read response body")?;
        Ok(Download {
            filename,
            content_type,
            body,
        })
    }
}

async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    anyhow::bail!("API error ({}): {}", status, message);
}

/// `attachment; filename="x.csv"` -> `x.csv`
fn attachment_filename(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

// API response types

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSnapshot {
    pub active_entity_count: usize,
    pub mean_cpu: f64,
    pub mean_memory: f64,
    pub mean_disk: f64,
    pub mean_network: f64,
    pub mean_response_time: f64,
    pub mean_error_rate: f64,
    pub total_requests: u64,
    pub open_alert_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub display_name: String,
    pub category: String,
    pub is_monitored: bool,
    pub health_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl Scope {
    pub fn label(&self) -> &str {
        self.entity_id.as_deref().unwrap_or("all")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub scope: Scope,
    pub window: String,
    pub metric: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatus {
    pub mode: String,
    pub interval_secs: u64,
    pub last_refresh_at: Option<String>,
    pub ticks: u64,
    pub tick_errors: u64,
    #[serde(default)]
    pub consecutive_errors: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub snapshot: AggregatedSnapshot,
    pub selection: Selection,
    pub entities: Vec<Entity>,
    pub refresh: RefreshStatus,
    pub last_refresh_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: String,
    pub entity_id: String,
    pub metric_key: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: String,
    pub timestamp: String,
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub metric_key: String,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub enabled: bool,
    pub unit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub at: String,
    pub appended: usize,
    pub rejected: usize,
    pub missing: usize,
    pub open_alerts: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}
