//! HTTP API for the monitoring session, health checks and Prometheus metrics

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use monitor_lib::{
    alerting::ThresholdUpdate,
    chart::{hover_from_pixel, ChartPoint, ChartProjection},
    export::{ExportFormat, ExportKind},
    health::{components, ComponentHealth, ComponentStatus, HealthRegistry},
    observability::MonitorMetrics,
    AggregatedSnapshot, AlertEvent, Entity, HealthStatus, MetricKey, MonitorError, MonitorSession,
    RefreshInterval, RefreshMode, RefreshScheduler, SchedulerStatus, SelectionUpdate,
    ThresholdConfig, TickReport, ViewSelection,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: MonitorMetrics,
    pub scheduler: RefreshScheduler<MonitorSession>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: MonitorMetrics,
        scheduler: RefreshScheduler<MonitorSession>,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            scheduler,
        }
    }
}

/// Library error rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MonitorError::NothingToExport => StatusCode::UNPROCESSABLE_ENTITY,
            MonitorError::UnknownEntity(_) | MonitorError::UnknownMetric(_) => {
                StatusCode::NOT_FOUND
            }
            MonitorError::OutOfOrderSample { .. } => StatusCode::CONFLICT,
            MonitorError::InvalidInterval(_)
            | MonitorError::UnknownWindow(_)
            | MonitorError::UnknownMode(_)
            | MonitorError::UnknownFormat(_)
            | MonitorError::InvalidViewport(_) => StatusCode::BAD_REQUEST,
            MonitorError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResponse {
    pub snapshot: AggregatedSnapshot,
    pub selection: ViewSelection,
    pub entities: Vec<Entity>,
    pub refresh: SchedulerStatus,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub metric: Option<MetricKey>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HoverQuery {
    /// Fraction of the plot width in `[0, 1]`
    pub r: Option<f64>,
    /// Pixel offset, converted using the current viewport width
    pub px: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoverResponse {
    pub ratio: f64,
    pub point: ChartPoint,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshUpdate {
    pub mode: Option<RefreshMode>,
    pub interval_secs: Option<RefreshInterval>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    /// Parsed by hand so an unknown format reports through `ApiError`
    pub format: Option<String>,
    pub kind: Option<ExportKind>,
}

/// Recompute component health from the scheduler and session state
async fn sync_health(state: &AppState) {
    let status = state.scheduler.status();
    state
        .health_registry
        .update(components::SCHEDULER, ComponentHealth::from_scheduler(&status))
        .await;

    let (monitored, down) = state.scheduler.with(|session| {
        let monitored: Vec<&Entity> = session.store().monitored().collect();
        let down = monitored
            .iter()
            .filter(|e| e.health_status == HealthStatus::Down)
            .count();
        (monitored.len(), down)
    });

    let store_health = if monitored == 0 {
        ComponentHealth::degraded("No monitored entities")
    } else {
        ComponentHealth::healthy()
    };
    state
        .health_registry
        .update(components::METRIC_STORE, store_health)
        .await;

    let source_health = if down == 0 {
        ComponentHealth::healthy()
    } else if down == monitored {
        ComponentHealth::unhealthy("No entity produced a sample")
    } else {
        ComponentHealth::degraded(format!("{down} of {monitored} entities silent"))
    };
    state
        .health_registry
        .update(components::SOURCE, source_health)
        .await;
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sync_health(&state).await;
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sync_health(&state).await;
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn snapshot(State(state): State<Arc<AppState>>) -> Json<SnapshotResponse> {
    let refresh = state.scheduler.status();
    let response = state.scheduler.with(|session| {
        let (snapshot, selection, last_refresh_at) = {
            let views = session.views();
            (views.snapshot.clone(), views.selection.clone(), views.last_refresh_at)
        };
        SnapshotResponse {
            snapshot,
            selection,
            last_refresh_at,
            entities: session.store().entities().cloned().collect(),
            refresh,
        }
    });
    Json(response)
}

/// Chart for the current selection. Query parameters update the selection.
async fn chart(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChartQuery>,
) -> ApiResult<Json<ChartProjection>> {
    let projection = state.scheduler.with(|session| {
        if query.metric.is_some() || query.width.is_some() || query.height.is_some() {
            session.select(SelectionUpdate {
                metric: query.metric,
                width: query.width,
                height: query.height,
                ..Default::default()
            })?;
        }
        Ok::<_, MonitorError>(session.views().projection.clone())
    })?;
    Ok(Json(projection))
}

async fn hover(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HoverQuery>,
) -> Response {
    let result = state.scheduler.with(|session| {
        let ratio = match (query.r, query.px) {
            (Some(r), _) => r,
            (None, Some(px)) => hover_from_pixel(px, session.selection().viewport.width),
            (None, None) => 0.0,
        };
        session
            .hover(ratio)
            .map(|point| HoverResponse { ratio, point })
    });

    match result {
        Some(hover) => Json(hover).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no samples in the current selection" })),
        )
            .into_response(),
    }
}

async fn breaches(State(state): State<Arc<AppState>>) -> Json<Vec<AlertEvent>> {
    Json(state.scheduler.with(|session| session.views().breaches.clone()))
}

async fn list_thresholds(State(state): State<Arc<AppState>>) -> Json<Vec<ThresholdConfig>> {
    Json(state.scheduler.with(|session| session.thresholds().list()))
}

async fn update_threshold(
    State(state): State<Arc<AppState>>,
    Path(metric): Path<String>,
    Json(update): Json<ThresholdUpdate>,
) -> ApiResult<Json<ThresholdConfig>> {
    let metric: MetricKey = metric.parse()?;
    let config = state
        .scheduler
        .with(|session| session.update_threshold(metric, update))?;
    Ok(Json(config))
}

async fn refresh_status(State(state): State<Arc<AppState>>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

async fn update_refresh(
    State(state): State<Arc<AppState>>,
    Json(update): Json<RefreshUpdate>,
) -> Json<SchedulerStatus> {
    // interval first so that entering live starts on the new period
    if let Some(interval) = update.interval_secs {
        state.scheduler.set_interval(interval);
    }
    if let Some(mode) = update.mode {
        if let Some(Err(e)) = state.scheduler.set_mode(mode) {
            warn!(error = %e, "First live tick failed");
        }
    }
    Json(state.scheduler.status())
}

async fn refresh_tick(State(state): State<Arc<AppState>>) -> ApiResult<Json<TickReport>> {
    Ok(Json(state.scheduler.refresh_now()?))
}

async fn update_selection(
    State(state): State<Arc<AppState>>,
    Json(update): Json<SelectionUpdate>,
) -> ApiResult<Json<ViewSelection>> {
    let selection = state
        .scheduler
        .with(|session| session.select(update).cloned())?;
    Ok(Json(selection))
}

async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let format = query
        .format
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?
        .unwrap_or_default();
    let kind = query.kind.unwrap_or_default();
    let payload = state
        .scheduler
        .with(|session| session.export(format, kind))?;

    let disposition = format!("attachment; filename=\"{}\"", payload.filename);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, payload.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        payload.body,
    )
        .into_response())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/snapshot", get(snapshot))
        .route("/api/v1/chart", get(chart))
        .route("/api/v1/chart/hover", get(hover))
        .route("/api/v1/breaches", get(breaches))
        .route("/api/v1/thresholds", get(list_thresholds))
        .route("/api/v1/thresholds/:metric", put(update_threshold))
        .route("/api/v1/refresh", get(refresh_status).put(update_refresh))
        .route("/api/v1/refresh/tick", post(refresh_tick))
        .route("/api/v1/selection", put(update_selection))
        .route("/api/v1/export", get(export))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
