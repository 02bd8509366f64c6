//! Monitoring session
//!
//! Ties the metric store, threshold configuration and a metric source
//! together, and keeps the derived views (snapshot, chart, breaches) for
//! the current selection memoized between ticks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::Result as AnyResult;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregator;
use crate::alerting::{
    extract_breaches, resolve_recovered, ThresholdBand, ThresholdEvaluator, ThresholdStore,
    ThresholdUpdate, DEFAULT_LIMIT,
};
use crate::chart::{self, ChartPoint, ChartProjection, Viewport, DEFAULT_PADDING_RATIO};
use crate::error::{MonitorError, Result};
use crate::export::{self, ExportFormat, ExportKind, ExportMetadata, ExportPayload};
use crate::memo::Memo;
use crate::models::{
    AggregatedSnapshot, AlertEvent, Entity, EntityScope, HealthStatus, MetricKey, Sample,
    ThresholdConfig, TimeWindow,
};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::refresh::{Refreshable, TickReport};
use crate::source::{self, BackfillReport, MetricSource};
use crate::store::{MetricStore, StoreConfig};

/// Source of "now" for windowing and sample timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the derived views are computed for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSelection {
    pub scope: EntityScope,
    pub window: TimeWindow,
    pub metric: MetricKey,
    pub viewport: Viewport,
    pub padding_ratio: f64,
    pub breach_limit: usize,
}

impl Default for ViewSelection {
    fn default() -> Self {
        Self {
            scope: EntityScope::All,
            window: TimeWindow::default(),
            metric: MetricKey::Cpu,
            viewport: Viewport::default(),
            padding_ratio: DEFAULT_PADDING_RATIO,
            breach_limit: DEFAULT_LIMIT,
        }
    }
}

/// Partial selection change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionUpdate {
    #[serde(default)]
    pub scope: Option<EntityScope>,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub metric: Option<MetricKey>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// Everything the presentation layer renders for one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedViews {
    pub selection: ViewSelection,
    pub snapshot: AggregatedSnapshot,
    pub projection: ChartProjection,
    pub breaches: Vec<AlertEvent>,
    pub thresholds: Vec<ThresholdConfig>,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
}

/// (data version, threshold revision, selection)
/// (data version, threshold revision, selection, whole-second window end)
type ViewKey = (u64, u64, ViewSelection, DateTime<Utc>);

pub struct MonitorSession {
    store: MetricStore,
    thresholds: ThresholdStore,
    source: Box<dyn MetricSource>,
    clock: Arc<dyn Clock>,
    selection: ViewSelection,
    views: Memo<ViewKey, DerivedViews>,
    data_version: u64,
    last_refresh_at: Option<DateTime<Utc>>,
    announced_breaches: HashSet<String>,
    metrics: MonitorMetrics,
    logger: StructuredLogger,
}

impl std::fmt::Debug for MonitorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSession")
            .field("entities", &self.store.len())
            .field("source", &self.source.name())
            .field("selection", &self.selection)
            .field("data_version", &self.data_version)
            .field("last_refresh_at", &self.last_refresh_at)
            .finish()
    }
}

impl MonitorSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    pub fn selection(&self) -> &ViewSelection {
        &self.selection
    }

    pub fn last_refresh_at(&self) -> Option<DateTime<Utc>> {
        self.last_refresh_at
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn register(&mut self, entity: Entity) {
        self.store.register(entity);
        self.touch();
    }

    pub fn set_monitored(&mut self, entity_id: &str, monitored: bool) -> Result<()> {
        self.store.set_monitored(entity_id, monitored)?;
        self.touch();
        Ok(())
    }

    /// Append an externally produced sample
    pub fn record(&mut self, entity_id: &str, sample: Sample) -> Result<()> {
        match self.store.append(entity_id, sample) {
            Ok(_) => {
                self.metrics.add_samples_appended(1);
                self.touch();
                Ok(())
            }
            Err(e) => {
                if matches!(e, MonitorError::OutOfOrderSample { .. }) {
                    self.metrics.add_samples_rejected(1);
                    self.logger.log_sample_rejected(entity_id, &e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Seed history for monitored entities over `[now - span, now)`
    pub fn backfill(&mut self, span: Duration, step: Duration) -> BackfillReport {
        let now = self.clock.now();
        let report = source::backfill(&mut self.store, self.source.as_mut(), now, span, step);
        self.metrics.add_samples_appended(report.appended);
        self.metrics.add_samples_rejected(report.rejected);
        self.touch();
        report
    }

    /// Append one sample per monitored entity, refresh entity health and
    /// recompute the derived views.
    ///
    /// Rejected samples are logged and counted; they never abort the tick.
    pub fn tick(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        let now = self.clock.now();
        let entities: Vec<Entity> = self.store.monitored().cloned().collect();
        let mut report = TickReport::empty(now);

        for entity in &entities {
            let Some(sample) = self.source.sample(entity, now) else {
                report.missing += 1;
                self.store.set_health(&entity.id, HealthStatus::Down)?;
                continue;
            };

            let band = ThresholdEvaluator::new(&self.thresholds).worst_band(&sample);
            match self.store.append(&entity.id, sample) {
                Ok(_) => {
                    report.appended += 1;
                    let health = if band == ThresholdBand::Critical {
                        HealthStatus::Degraded
                    } else {
                        HealthStatus::Healthy
                    };
                    self.store.set_health(&entity.id, health)?;
                }
                Err(e) => {
                    report.rejected += 1;
                    self.logger.log_sample_rejected(&entity.id, &e.to_string());
                }
            }
        }

        self.last_refresh_at = Some(now);
        self.touch();

        let views = self.views();
        let open_alerts = views.snapshot.open_alert_count;
        let breaches = views.breaches.clone();
        self.announce_breaches(&breaches);
        report.open_alerts = open_alerts;

        let elapsed = started.elapsed();
        self.metrics.observe_tick_latency(elapsed.as_secs_f64());
        self.metrics.inc_ticks();
        self.metrics.add_samples_appended(report.appended);
        self.metrics.add_samples_rejected(report.rejected);
        self.metrics.set_monitored_entities(entities.len());
        self.metrics.set_open_alerts(open_alerts);
        let stored = self
            .store
            .entities()
            .map(|e| self.store.sample_count(&e.id))
            .sum::<usize>();
        self.metrics.set_stored_samples(stored);
        self.logger
            .log_refresh_tick(report.appended, report.rejected, open_alerts, elapsed.as_millis());

        Ok(report)
    }

    /// Derived views for the current selection.
    ///
    /// Recomputed when the data, thresholds or selection changed, or when
    /// the clock moved into a new second, so samples age out of the window
    /// between ticks in manual mode too.
    pub fn views(&mut self) -> &DerivedViews {
        let window_end = self.clock.now().trunc_subsecs(0);
        let key = (
            self.data_version,
            self.thresholds.revision(),
            self.selection.clone(),
            window_end,
        );
        let MonitorSession {
            store,
            thresholds,
            clock,
            selection,
            views,
            last_refresh_at,
            ..
        } = self;
        views.get_or_compute(key, || {
            compute_views(store, thresholds, selection, *last_refresh_at, clock.now())
        })
    }

    /// Chart point under a horizontal pointer fraction
    pub fn hover(&mut self, ratio: f64) -> Option<ChartPoint> {
        self.views().projection.point_at(ratio).cloned()
    }

    pub fn select(&mut self, update: SelectionUpdate) -> Result<&ViewSelection> {
        let mut next = self.selection.clone();

        if let Some(scope) = update.scope {
            if let EntityScope::Entity(id) = &scope {
                if self.store.entity(id).is_none() {
                    return Err(MonitorError::UnknownEntity(id.clone()));
                }
            }
            next.scope = scope;
        }
        if let Some(window) = update.window {
            next.window = window;
        }
        if let Some(metric) = update.metric {
            next.metric = metric;
        }
        if update.width.is_some() || update.height.is_some() {
            let width = update.width.unwrap_or(next.viewport.width);
            let height = update.height.unwrap_or(next.viewport.height);
            if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
                return Err(MonitorError::InvalidViewport(format!("{width}x{height}")));
            }
            next.viewport = Viewport::new(width, height);
        }

        self.selection = next;
        Ok(&self.selection)
    }

    /// Apply a partial threshold edit; cached views pick it up on next read
    pub fn update_threshold(
        &mut self,
        metric: MetricKey,
        update: ThresholdUpdate,
    ) -> Result<ThresholdConfig> {
        let config = self.thresholds.update(metric, update)?.clone();
        self.logger.log_thresholds_updated(
            metric,
            config.warning_threshold,
            config.critical_threshold,
            config.enabled,
        );
        Ok(config)
    }

    /// Serialize the current scope and window
    pub fn export(&mut self, format: ExportFormat, kind: ExportKind) -> Result<ExportPayload> {
        let now = self.clock.now();
        let scope = self.selection.scope.clone();
        let window = self.selection.window;

        let metadata = ExportMetadata {
            export_date: now,
            repository_name: match &scope {
                EntityScope::All => scope.label().to_string(),
                EntityScope::Entity(id) => self
                    .store
                    .entity(id)
                    .map(|e| e.display_name.clone())
                    .unwrap_or_else(|| id.clone()),
            },
            time_range: window,
        };

        let body = match kind {
            ExportKind::Samples => {
                let samples = self.store.query(&scope, window, now);
                match format {
                    ExportFormat::Csv => export::to_csv(&samples)?,
                    ExportFormat::Json => export::to_json(&samples, &metadata)?,
                }
            }
            ExportKind::Breaches => {
                let breaches = &self.views().breaches;
                match format {
                    ExportFormat::Csv => export::breaches_to_csv(breaches)?,
                    ExportFormat::Json => export::breaches_to_json(breaches, &metadata)?,
                }
            }
        };

        let filename = export::export_filename(scope.label(), kind, window, format, now);
        self.logger.log_export(&filename, body.len());

        Ok(ExportPayload {
            filename,
            mime_type: format.mime_type().to_string(),
            body,
        })
    }

    pub fn close(&self, reason: &str) {
        self.logger.log_session_closed(reason);
    }

    fn touch(&mut self) {
        self.data_version += 1;
    }

    fn announce_breaches(&mut self, breaches: &[AlertEvent]) {
        let current: HashSet<&str> = breaches.iter().map(|b| b.id.as_str()).collect();
        self.announced_breaches.retain(|id| current.contains(id.as_str()));

        for breach in breaches.iter().filter(|b| !b.resolved) {
            if self.announced_breaches.insert(breach.id.clone()) {
                self.logger.log_breach(breach);
            }
        }
    }
}

impl Refreshable for MonitorSession {
    fn refresh(&mut self) -> Result<TickReport> {
        self.tick()
    }
}

fn scope_ids(store: &MetricStore, scope: &EntityScope) -> Vec<String> {
    match scope {
        EntityScope::All => store.monitored().map(|e| e.id.clone()).collect(),
        EntityScope::Entity(id) => vec![id.clone()],
    }
}

fn compute_views(
    store: &MetricStore,
    thresholds: &ThresholdStore,
    selection: &ViewSelection,
    last_refresh_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DerivedViews {
    let mut samples = store.query(&selection.scope, selection.window, now);
    // fleet scope plots every entity's samples on one time-ordered line
    samples.sort_by_key(|s| s.timestamp);

    let snapshot =
        Aggregator::new(store, thresholds).aggregate_scope(&selection.scope, selection.window, now);

    let projection = chart::project(
        &samples,
        selection.metric,
        selection.viewport,
        selection.padding_ratio,
        thresholds.effective_critical(selection.metric),
    );

    let mut breaches = extract_breaches(&samples, thresholds, selection.breach_limit);
    let latest: Vec<Sample> = scope_ids(store, &selection.scope)
        .iter()
        .filter_map(|id| store.latest(id, selection.window, now).cloned())
        .collect();
    resolve_recovered(&mut breaches, &latest, thresholds);

    DerivedViews {
        selection: selection.clone(),
        snapshot,
        projection,
        breaches,
        thresholds: thresholds.list(),
        last_refresh_at,
        computed_at: now,
    }
}

/// Builder for [`MonitorSession`]
#[derive(Default)]
pub struct SessionBuilder {
    entities: Vec<Entity>,
    thresholds: Option<ThresholdStore>,
    store_config: Option<StoreConfig>,
    source: Option<Box<dyn MetricSource>>,
    clock: Option<Arc<dyn Clock>>,
    selection: Option<ViewSelection>,
    instance: Option<String>,
}

impl SessionBuilder {
    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entities(mut self, entities: impl IntoIterator<Item = Entity>) -> Self {
        self.entities.extend(entities);
        self
    }

    pub fn thresholds(mut self, thresholds: ThresholdStore) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = Some(config);
        self
    }

    pub fn source(mut self, source: impl MetricSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn selection(mut self, selection: ViewSelection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Name attached to every structured log event
    pub fn instance(mut self, name: impl Into<String>) -> Self {
        self.instance = Some(name.into());
        self
    }

    pub fn build(self) -> AnyResult<MonitorSession> {
        let source = self
            .source
            .ok_or_else(|| anyhow::anyhow!("Metric source is required"))?;

        let mut store = MetricStore::with_config(self.store_config.unwrap_or_default());
        for entity in self.entities {
            store.register(entity);
        }

        let selection = self.selection.unwrap_or_default();
        if let EntityScope::Entity(id) = &selection.scope {
            if store.entity(id).is_none() {
                anyhow::bail!("Selected entity {id} is not registered");
            }
        }

        let metrics = MonitorMetrics::new();
        metrics.set_monitored_entities(store.monitored().count());

        Ok(MonitorSession {
            store,
            thresholds: self.thresholds.unwrap_or_default(),
            source,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            selection,
            views: Memo::new(),
            data_version: 0,
            last_refresh_at: None,
            announced_breaches: HashSet::new(),
            metrics,
            logger: StructuredLogger::new(
                self.instance.unwrap_or_else(|| "fleet-monitor".to_string()),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertSeverity;
    use crate::source::SyntheticSource;
    use crate::store::tests::{sample_at, t0};
    use std::collections::HashMap;

    /// Replays fixed cpu values per entity; `None` means silent
    #[derive(Default)]
    struct Scripted {
        cpu: HashMap<String, Option<f64>>,
    }

    impl Scripted {
        fn with(mut self, entity: &str, cpu: Option<f64>) -> Self {
            self.cpu.insert(entity.to_string(), cpu);
            self
        }
    }

    impl MetricSource for Scripted {
        fn sample(&mut self, entity: &Entity, at: DateTime<Utc>) -> Option<Sample> {
            let cpu = self.cpu.get(&entity.id).copied().flatten()?;
            Some(sample_at(&entity.id, at, cpu))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn session(source: impl MetricSource + 'static, clock: &ManualClock) -> MonitorSession {
        MonitorSession::builder()
            .entity(Entity::new("web", "Web Frontend", "service"))
            .entity(Entity::new("db", "Primary DB", "database"))
            .entity(Entity::new("legacy", "Legacy", "service").unmonitored())
            .source(source)
            .clock(clock.clone())
            .instance("test")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_source() {
        let err = MonitorSession::builder().build().unwrap_err();
        assert!(err.to_string().contains("source is required"));
    }

    #[test]
    fn test_tick_appends_and_sets_health() {
        let clock = ManualClock::new(t0());
        let source = Scripted::default().with("web", Some(95.0)).with("db", None);
        let mut s = session(source, &clock);

        let report = s.tick().unwrap();
        assert_eq!(report.appended, 1);
        assert_eq!(report.missing, 1);
        assert_eq!(report.rejected, 0);
        assert_eq!(report.open_alerts, 1);
        assert_eq!(s.last_refresh_at(), Some(t0()));

        assert_eq!(s.store().entity("web").unwrap().health_status, HealthStatus::Degraded);
        assert_eq!(s.store().entity("db").unwrap().health_status, HealthStatus::Down);
        assert_eq!(s.store().sample_count("legacy"), 0);
    }

    #[test]
    fn test_rejected_sample_does_not_abort_tick() {
        let clock = ManualClock::new(t0());
        let source = Scripted::default().with("web", Some(10.0)).with("db", Some(20.0));
        let mut s = session(source, &clock);

        s.record("web", sample_at("web", t0() + Duration::minutes(5), 10.0)).unwrap();
        let report = s.tick().unwrap();

        assert_eq!(report.rejected, 1);
        assert_eq!(report.appended, 1);
        assert_eq!(s.store().sample_count("db"), 1);
    }

    #[test]
    fn test_views_are_memoized_until_inputs_change() {
        let clock = ManualClock::new(t0());
        let source = Scripted::default().with("web", Some(10.0)).with("db", Some(30.0));
        let mut s = session(source, &clock);
        s.tick().unwrap();

        let first = s.views().clone();
        assert_eq!(first.snapshot.active_entity_count, 2);
        assert!((first.snapshot.mean_cpu - 20.0).abs() < 1e-9);
        assert_eq!(first.projection.points.len(), 2);

        clock.advance(Duration::milliseconds(400));
        assert_eq!(s.views().computed_at, first.computed_at);

        s.update_threshold(
            MetricKey::Cpu,
            ThresholdUpdate {
                critical_threshold: Some(25.0),
                ..Default::default()
            },
        )
        .unwrap();
        let after = s.views().clone();
        assert_ne!(after.computed_at, first.computed_at);
        assert_eq!(after.snapshot.open_alert_count, 1);
        assert_eq!(after.breaches.len(), 1);
        assert_eq!(after.breaches[0].entity_id, "db");
        assert_eq!(after.breaches[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn test_views_drop_aged_out_samples_without_a_tick() {
        let clock = ManualClock::new(t0());
        let source = Scripted::default().with("web", Some(10.0)).with("db", Some(30.0));
        let mut s = session(source, &clock);
        s.select(SelectionUpdate {
            window: Some(TimeWindow::OneHour),
            ..Default::default()
        })
        .unwrap();
        s.tick().unwrap();
        assert_eq!(s.views().snapshot.active_entity_count, 2);

        clock.advance(Duration::minutes(61));
        let aged = s.views().clone();
        assert_eq!(aged.computed_at, t0() + Duration::minutes(61));
        assert_eq!(aged.snapshot, AggregatedSnapshot::default());
        assert!(aged.projection.points.is_empty());
        assert!(matches!(
            s.export(ExportFormat::Csv, ExportKind::Samples),
            Err(MonitorError::NothingToExport)
        ));
    }

    #[test]
    fn test_selection_changes_scope_and_viewport() {
        let clock = ManualClock::new(t0());
        let source = Scripted::default().with("web", Some(10.0)).with("db", Some(30.0));
        let mut s = session(source, &clock);
        s.tick().unwrap();

        s.select(SelectionUpdate {
            scope: Some(EntityScope::entity("db")),
            width: Some(400.0),
            ..Default::default()
        })
        .unwrap();

        let views = s.views().clone();
        assert_eq!(views.snapshot.active_entity_count, 1);
        assert_eq!(views.snapshot.mean_cpu, 30.0);
        assert_eq!(views.projection.view_bounds.width, 400.0);
        assert_eq!(views.projection.view_bounds.height, 240.0);

        assert!(matches!(
            s.select(SelectionUpdate {
                scope: Some(EntityScope::entity("nope")),
                ..Default::default()
            }),
            Err(MonitorError::UnknownEntity(_))
        ));
        assert!(matches!(
            s.select(SelectionUpdate {
                height: Some(0.0),
                ..Default::default()
            }),
            Err(MonitorError::InvalidViewport(_))
        ));
        assert_eq!(s.selection().scope, EntityScope::entity("db"));
    }

    #[test]
    fn test_breach_resolves_after_recovery() {
        let clock = ManualClock::new(t0());
        let mut s = session(Scripted::default(), &clock);

        s.record("web", sample_at("web", t0(), 95.0)).unwrap();
        let open = s.views().breaches.clone();
        assert_eq!(open.len(), 1);
        assert!(!open[0].resolved);
        assert_eq!(open[0].severity, AlertSeverity::Warning);

        clock.advance(Duration::seconds(5));
        s.record("web", sample_at("web", t0() + Duration::seconds(5), 20.0)).unwrap();
        let later = s.views().breaches.clone();
        assert_eq!(later.len(), 1);
        assert!(later[0].resolved);
    }

    #[test]
    fn test_export_uses_current_scope_and_window() {
        let clock = ManualClock::new(t0());
        let source = Scripted::default().with("web", Some(10.0)).with("db", Some(30.0));
        let mut s = session(source, &clock);
        for _ in 0..3 {
            s.tick().unwrap();
            clock.advance(Duration::seconds(5));
        }

        let payload = s.export(ExportFormat::Csv, ExportKind::Samples).unwrap();
        assert_eq!(payload.filename, "all-metrics-24h-2024-03-01.csv");
        assert_eq!(payload.mime_type, "text/csv");
        assert_eq!(payload.body.lines().count(), 7);

        s.select(SelectionUpdate {
            scope: Some(EntityScope::entity("web")),
            ..Default::default()
        })
        .unwrap();
        let json = s.export(ExportFormat::Json, ExportKind::Samples).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json.body).unwrap();
        assert_eq!(doc["repositoryName"], "Web Frontend");
        assert_eq!(doc["samples"].as_array().unwrap().len(), 3);

        assert!(matches!(
            s.export(ExportFormat::Csv, ExportKind::Breaches),
            Err(MonitorError::NothingToExport)
        ));
    }

    #[test]
    fn test_empty_window_export_is_refused() {
        let clock = ManualClock::new(t0());
        let mut s = session(Scripted::default(), &clock);
        assert!(matches!(
            s.export(ExportFormat::Json, ExportKind::Samples),
            Err(MonitorError::NothingToExport)
        ));
    }

    #[test]
    fn test_backfill_then_tick_with_synthetic_source() {
        let clock = ManualClock::new(t0());
        let mut s = session(SyntheticSource::new(11), &clock);

        let report = s.backfill(Duration::hours(1), Duration::minutes(1));
        assert_eq!(report.appended, 120);

        let tick = s.tick().unwrap();
        assert_eq!(tick.appended, 2);
        assert_eq!(s.views().projection.points.len(), 122);
        assert!(s.hover(1.0).is_some());
    }
}
