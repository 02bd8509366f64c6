//! Monitor Agent - fleet resource monitoring service
//!
//! Runs a monitoring session over a synthetic metric source, refreshes it
//! live or on demand, and serves the derived views over HTTP.

use anyhow::{Context, Result};
use monitor_agent::{api, config};
use monitor_lib::{
    health::{components, HealthRegistry},
    observability::{MonitorMetrics, StructuredLogger},
    source::SyntheticSource,
    MonitorSession, RefreshMode, RefreshScheduler,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting monitor-agent");

    let config = config::AgentConfig::load()?;
    let mode = config.refresh_mode()?;
    let interval = config.refresh_interval()?;
    info!(
        instance = %config.instance_name,
        mode = %mode,
        interval_secs = interval.as_secs(),
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    for name in components::ALL {
        health_registry.register(name).await;
    }

    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(&config.instance_name);

    let mut session = MonitorSession::builder()
        .entities(config.entities())
        .thresholds(config.threshold_store()?)
        .store_config(config.store_config())
        .source(SyntheticSource::new(config.seed))
        .instance(&config.instance_name)
        .build()
        .context("Failed to build monitoring session")?;

    if config.backfill_hours > 0 && config.backfill_step_secs > 0 {
        let report = session.backfill(
            chrono::Duration::hours(config.backfill_hours),
            chrono::Duration::seconds(config.backfill_step_secs),
        );
        info!(appended = report.appended, rejected = report.rejected, "History backfilled");
    }

    let entity_count = session.store().monitored().count();
    let scheduler = RefreshScheduler::new(session, interval, logger.clone());
    logger.log_session_started(AGENT_VERSION, entity_count, mode);

    match scheduler.set_mode(mode) {
        Some(Err(e)) => warn!(error = %e, "Initial refresh failed"),
        Some(Ok(_)) => {}
        None if mode == RefreshMode::Manual => {
            if let Err(e) = scheduler.refresh_now() {
                warn!(error = %e, "Initial refresh failed");
            }
        }
        None => {}
    }

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        scheduler.clone(),
    ));

    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Err(e)) => error!(error = %e, "API server failed"),
                Err(e) => error!(error = %e, "API server task panicked"),
                Ok(Ok(())) => {}
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("SIGINT received");
        }
    }

    scheduler.shutdown();
    scheduler.with(|session| session.close("shutdown"));
    info!("Shutting down");

    Ok(())
}
