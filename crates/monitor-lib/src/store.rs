//! Metric store
//!
//! Holds the time-ordered sample history of every registered entity.
//! Appends are strictly ordered per entity and retention is enforced
//! lazily: each append evicts that entity's samples older than the
//! retention horizon (30 days by default).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use tracing::debug;

use crate::error::{MonitorError, Result};
use crate::models::{Entity, EntityScope, HealthStatus, Sample, TimeWindow};

/// Configuration for the metric store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Minimum gap required between consecutive samples of one entity
    pub min_spacing: Duration,
    /// Samples older than this (relative to the newest sample) are evicted
    pub retention: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            min_spacing: Duration::zero(),
            retention: TimeWindow::MAX.duration(),
        }
    }
}

/// What an append did to the series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    /// The sample replaced one with the same timestamp
    pub replaced: bool,
    /// Number of samples evicted by retention
    pub evicted: usize,
}

#[derive(Debug)]
struct EntitySeries {
    entity: Entity,
    samples: VecDeque<Sample>,
}

impl EntitySeries {
    /// Index range of samples within `[from, to]`
    fn window_bounds(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> (usize, usize) {
        let start = self.samples.partition_point(|s| s.timestamp < from);
        let end = self.samples.partition_point(|s| s.timestamp <= to);
        (start, end.max(start))
    }

    fn in_window(&self, window: TimeWindow, now: DateTime<Utc>) -> impl Iterator<Item = &Sample> {
        let (start, end) = self.window_bounds(now - window.duration(), now);
        self.samples.range(start..end)
    }
}

/// Per-entity sample history, the single owner of raw samples
#[derive(Debug, Default)]
pub struct MetricStore {
    config: StoreConfig,
    /// Series in registration order
    series: Vec<EntitySeries>,
    /// entity_id -> index into `series`
    index: HashMap<String, usize>,
}

impl MetricStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            series: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Register an entity.
    ///
    /// Registering a known id replaces its metadata and keeps its history.
    pub fn register(&mut self, entity: Entity) {
        match self.index.get(&entity.id) {
            Some(&idx) => {
                debug!(entity_id = %entity.id, "Updating entity metadata");
                self.series[idx].entity = entity;
            }
            None => {
                debug!(entity_id = %entity.id, "Registering entity");
                self.index.insert(entity.id.clone(), self.series.len());
                self.series.push(EntitySeries {
                    entity,
                    samples: VecDeque::new(),
                });
            }
        }
    }

    pub fn entity(&self, entity_id: &str) -> Option<&Entity> {
        self.series_for(entity_id).map(|s| &s.entity)
    }

    /// All entities in registration order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.series.iter().map(|s| &s.entity)
    }

    /// Entities that take part in aggregation and live refresh
    pub fn monitored(&self) -> impl Iterator<Item = &Entity> {
        self.entities().filter(|e| e.is_monitored)
    }

    pub fn set_monitored(&mut self, entity_id: &str, monitored: bool) -> Result<()> {
        let series = self.series_for_mut(entity_id)?;
        series.entity.is_monitored = monitored;
        Ok(())
    }

    pub fn set_health(&mut self, entity_id: &str, status: HealthStatus) -> Result<()> {
        let series = self.series_for_mut(entity_id)?;
        series.entity.health_status = status;
        Ok(())
    }

    /// Append a sample to an entity's history.
    ///
    /// Fails with [`MonitorError::OutOfOrderSample`] when the sample is
    /// older than the last stored one, or newer by less than the minimum
    /// spacing. A sample with exactly the last timestamp replaces it.
    ///
    /// Timestamps are stored at millisecond precision, the precision
    /// exports and breach ids carry.
    pub fn append(&mut self, entity_id: &str, mut sample: Sample) -> Result<AppendOutcome> {
        let min_spacing = self.config.min_spacing;
        let retention = self.config.retention;
        let series = self.series_for_mut(entity_id)?;
        sample.entity_id = entity_id.to_string();
        sample.timestamp = sample.timestamp.trunc_subsecs(3);

        let mut replaced = false;
        if let Some(last) = series.samples.back_mut() {
            let gap = sample.timestamp - last.timestamp;
            if gap == Duration::zero() {
                *last = sample.clone();
                replaced = true;
            } else if gap < Duration::zero() || gap < min_spacing {
                return Err(MonitorError::OutOfOrderSample {
                    entity_id: entity_id.to_string(),
                    timestamp: sample.timestamp,
                    last_timestamp: last.timestamp,
                });
            }
        }

        let newest = sample.timestamp;
        if !replaced {
            series.samples.push_back(sample);
        }

        let cutoff = newest - retention;
        let mut evicted = 0;
        while let Some(front) = series.samples.front() {
            if front.timestamp < cutoff {
                series.samples.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }

        if evicted > 0 {
            debug!(entity_id = %entity_id, evicted, "Evicted samples past retention");
        }

        Ok(AppendOutcome { replaced, evicted })
    }

    /// Samples within `[now - window, now]`, ascending.
    ///
    /// `EntityScope::All` concatenates the series of every monitored
    /// entity in registration order; samples are not time-merged.
    pub fn query(
        &self,
        scope: &EntityScope,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Vec<Sample> {
        match scope {
            EntityScope::Entity(id) => self
                .series_for(id)
                .map(|s| s.in_window(window, now).cloned().collect())
                .unwrap_or_default(),
            EntityScope::All => self
                .series
                .iter()
                .filter(|s| s.entity.is_monitored)
                .flat_map(|s| s.in_window(window, now).cloned())
                .collect(),
        }
    }

    /// Samples of one entity within the window, without cloning
    pub fn window<'a>(
        &'a self,
        entity_id: &str,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Box<dyn Iterator<Item = &'a Sample> + 'a> {
        match self.series_for(entity_id) {
            Some(series) => Box::new(series.in_window(window, now)),
            None => Box::new(std::iter::empty()),
        }
    }

    /// Newest sample of an entity within the window
    pub fn latest(
        &self,
        entity_id: &str,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> Option<&Sample> {
        self.window(entity_id, window, now).last()
    }

    pub fn last_timestamp(&self, entity_id: &str) -> Option<DateTime<Utc>> {
        self.series_for(entity_id)
            .and_then(|s| s.samples.back())
            .map(|s| s.timestamp)
    }

    pub fn sample_count(&self, entity_id: &str) -> usize {
        self.series_for(entity_id).map_or(0, |s| s.samples.len())
    }

    /// Total number of stored samples
    pub fn len(&self) -> usize {
        self.series.iter().map(|s| s.samples.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|s| s.samples.is_empty())
    }

    fn series_for(&self, entity_id: &str) -> Option<&EntitySeries> {
        self.index.get(entity_id).map(|&idx| &self.series[idx])
    }

    fn series_for_mut(&mut self, entity_id: &str) -> Result<&mut EntitySeries> {
        match self.index.get(entity_id) {
            Some(&idx) => Ok(&mut self.series[idx]),
            None => Err(MonitorError::UnknownEntity(entity_id.to_string())),
        }
    }
}
