//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use monitor_agent::api::{create_router, AppState};
use monitor_lib::{
    health::{components, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    session::ManualClock,
    source::SyntheticSource,
    Entity, MonitorSession, RefreshInterval, RefreshScheduler,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

async fn setup_test_app() -> (Router, Arc<AppState>, ManualClock) {
    let clock = ManualClock::new(t0());
    let session = MonitorSession::builder()
        .entity(Entity::new("web", "Web Frontend", "service"))
        .entity(Entity::new("db", "Primary DB", "database"))
        .source(SyntheticSource::new(7))
        .clock(clock.clone())
        .instance("api-test")
        .build()
        .unwrap();
    let scheduler = RefreshScheduler::new(
        session,
        RefreshInterval::FiveSeconds,
        StructuredLogger::new("api-test"),
    );

    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    let state = Arc::new(AppState::new(health_registry, MonitorMetrics::new(), scheduler));
    let router = create_router(state.clone());

    (router, state, clock)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, "GET", uri, None).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// Tick three times, five seconds apart
fn populate(state: &AppState, clock: &ManualClock) {
    for _ in 0..3 {
        state.scheduler.refresh_now().unwrap();
        clock.advance(chrono::Duration::seconds(5));
    }
}

#[tokio::test]
async fn test_healthz_returns_ok_after_refresh() {
    let (app, state, clock) = setup_test_app().await;
    populate(&state, &clock);

    let (status, health) = get_json(&app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["scheduler"]["status"], "healthy");
    assert_eq!(health["components"]["source"]["status"], "healthy");
}

#[tokio::test]
async fn test_readyz_follows_readiness_flag() {
    let (app, state, _clock) = setup_test_app().await;

    let (status, readiness) = get_json(&app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, readiness) = get_json(&app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_monitor_metrics() {
    let (app, state, clock) = setup_test_app().await;
    populate(&state, &clock);

    let (status, body) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("fleet_monitor_ticks_total"));
    assert!(text.contains("fleet_monitor_samples_appended_total"));
}

#[tokio::test]
async fn test_snapshot_reports_fleet() {
    let (app, state, clock) = setup_test_app().await;
    populate(&state, &clock);

    let (status, body) = get_json(&app, "/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["snapshot"]["activeEntityCount"], 2);
    assert_eq!(body["entities"].as_array().unwrap().len(), 2);
    assert_eq!(body["refresh"]["mode"], "manual");
    assert_eq!(body["refresh"]["ticks"], 3);
    assert!(body["lastRefreshAt"].is_string());
}

#[tokio::test]
async fn test_empty_export_is_unprocessable() {
    let (app, _state, _clock) = setup_test_app().await;

    let (status, body) = get_json(&app, "/api/v1/export?format=csv").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, json!({ "error": "nothing to export" }));
}

#[tokio::test]
async fn test_unknown_export_format_is_bad_request() {
    let (app, state, clock) = setup_test_app().await;
    populate(&state, &clock);

    let (status, body) = get_json(&app, "/api/v1/export?format=xml").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("xml"));
}

#[tokio::test]
async fn test_csv_export_sets_download_headers() {
    let (app, state, clock) = setup_test_app().await;
    populate(&state, &clock);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/export?format=csv&kind=samples")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("all-metrics-24h-2024-03-01.csv"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("Timestamp,Repository,CPU"));
    assert_eq!(lines.count(), 6);
}

#[tokio::test]
async fn test_threshold_update_produces_breaches() {
    let (app, state, clock) = setup_test_app().await;
    populate(&state, &clock);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/thresholds/cpu",
        Some(json!({ "criticalThreshold": 1.0, "warningThreshold": 0.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let config: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(config["criticalThreshold"], 1.0);

    let (_, breaches) = get_json(&app, "/api/v1/breaches").await;
    let breaches = breaches.as_array().unwrap();
    assert_eq!(breaches.len(), 6);
    assert!(breaches.iter().all(|b| b["metricKey"] == "cpu"));
    assert!(breaches.iter().all(|b| b["severity"] == "critical"));

    let (_, thresholds) = get_json(&app, "/api/v1/thresholds").await;
    let cpu = thresholds
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["metricKey"] == "cpu")
        .unwrap()
        .clone();
    assert_eq!(cpu["criticalThreshold"], 1.0);
}

#[tokio::test]
async fn test_unknown_metric_threshold_is_not_found() {
    let (app, _state, _clock) = setup_test_app().await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/thresholds/latency",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let error: Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("latency"));
}

#[tokio::test]
async fn test_refresh_mode_switch() {
    let (app, state, _clock) = setup_test_app().await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/refresh",
        Some(json!({ "mode": "live", "intervalSecs": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(refresh["mode"], "live");
    assert_eq!(refresh["intervalSecs"], 2);
    assert_eq!(refresh["ticks"], 1);

    let (_, body) = send(&app, "PUT", "/api/v1/refresh", Some(json!({ "mode": "manual" }))).await;
    let refresh: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(refresh["mode"], "manual");
    assert_eq!(state.scheduler.status().mode.to_string(), "manual");
}

#[tokio::test]
async fn test_unsupported_interval_is_rejected() {
    let (app, state, _clock) = setup_test_app().await;

    let body = json!({ "intervalSecs": 3 });
    let (status, _) = send(&app, "PUT", "/api/v1/refresh", Some(body)).await;
    assert!(status.is_client_error());
    assert_eq!(state.scheduler.status().interval_secs, 5);
}

#[tokio::test]
async fn test_manual_tick_endpoint() {
    let (app, _state, _clock) = setup_test_app().await;

    let (status, body) = send(&app, "POST", "/api/v1/refresh/tick", None).await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["appended"], 2);
    assert_eq!(report["rejected"], 0);
}

#[tokio::test]
async fn test_chart_and_hover() {
    let (app, state, clock) = setup_test_app().await;

    let (status, _) = get_json(&app, "/api/v1/chart/hover?r=0.5").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    populate(&state, &clock);

    let (status, chart) = get_json(&app, "/api/v1/chart?metric=memory&width=400").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chart["metric"], "memory");
    assert_eq!(chart["points"].as_array().unwrap().len(), 6);
    assert_eq!(chart["viewBounds"]["width"], 400.0);

    let (status, hover) = get_json(&app, "/api/v1/chart/hover?r=1.0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hover["point"]["x"], 400.0);

    let (status, hover) = get_json(&app, "/api/v1/chart/hover?px=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hover["ratio"], 0.0);
}

#[tokio::test]
async fn test_selection_rejects_unknown_entity() {
    let (app, _state, _clock) = setup_test_app().await;

    let (status, _) = send(
        &app,
        "PUT",
        "/api/v1/selection",
        Some(json!({ "scope": { "kind": "entity", "entityId": "nope" } })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        "PUT",
        "/api/v1/selection",
        Some(json!({ "scope": { "kind": "entity", "entityId": "db" }, "window": "1h" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let selection: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(selection["scope"]["entityId"], "db");
    assert_eq!(selection["window"], "1h");
}
