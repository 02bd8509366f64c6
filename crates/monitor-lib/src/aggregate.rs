//! Fleet-wide aggregation
//!
//! Reduces per-entity samples to an [`AggregatedSnapshot`]. The mean
//! fields are instantaneous: only the newest sample of each entity in the
//! window contributes. `total_requests` sums over every sample in the
//! window. Entities without samples in the window do not dilute the means.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::alerting::{ThresholdBand, ThresholdEvaluator, ThresholdStore};
use crate::models::{AggregatedSnapshot, EntityScope, MetricKey, TimeWindow};
use crate::store::MetricStore;

#[derive(Debug, Default)]
struct Sums {
    contributors: usize,
    cpu: f64,
    memory: f64,
    disk: f64,
    network: f64,
    response_time: f64,
    error_rate: f64,
    requests: u64,
    open_alerts: usize,
}

impl Sums {
    fn into_snapshot(self) -> AggregatedSnapshot {
        if self.contributors == 0 {
            return AggregatedSnapshot::default();
        }
        let n = self.contributors as f64;
        AggregatedSnapshot {
            active_entity_count: self.contributors,
            mean_cpu: self.cpu / n,
            mean_memory: self.memory / n,
            mean_disk: self.disk / n,
            mean_network: self.network / n,
            mean_response_time: self.response_time / n,
            mean_error_rate: self.error_rate / n,
            total_requests: self.requests,
            open_alert_count: self.open_alerts,
        }
    }
}

/// Read-only aggregation over the store and current thresholds
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    store: &'a MetricStore,
    thresholds: &'a ThresholdStore,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a MetricStore, thresholds: &'a ThresholdStore) -> Self {
        Self { store, thresholds }
    }

    /// Aggregate the given entities over `[now - window, now]`.
    ///
    /// Unknown and unmonitored entities are skipped, duplicates count once.
    /// An empty selection yields an all-zero snapshot.
    pub fn aggregate<I, S>(
        &self,
        entity_ids: I,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> AggregatedSnapshot
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let evaluator = ThresholdEvaluator::new(self.thresholds);
        let mut seen = HashSet::new();
        let mut sums = Sums::default();

        for id in entity_ids {
            let id = id.as_ref();
            if !seen.insert(id.to_string()) {
                continue;
            }
            match self.store.entity(id) {
                Some(entity) if entity.is_monitored => {}
                _ => continue,
            }

            let Some(latest) = self.store.latest(id, window, now) else {
                continue;
            };

            sums.contributors += 1;
            sums.cpu += latest.cpu;
            sums.memory += latest.memory;
            sums.disk += latest.disk;
            sums.network += latest.network;
            sums.response_time += latest.response_time;
            sums.error_rate += latest.error_rate;
            sums.open_alerts += MetricKey::ALL
                .iter()
                .filter_map(|&m| latest.value(m).map(|v| evaluator.classify(m, v)))
                .filter(|band| *band == ThresholdBand::Critical)
                .count();
            sums.requests += self
                .store
                .window(id, window, now)
                .map(|s| s.request_count)
                .sum::<u64>();
        }

        sums.into_snapshot()
    }

    /// Aggregate everything a scope covers
    pub fn aggregate_scope(
        &self,
        scope: &EntityScope,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> AggregatedSnapshot {
        match scope {
            EntityScope::All => {
                let ids: Vec<&str> = self.store.monitored().map(|e| e.id.as_str()).collect();
                self.aggregate(ids, window, now)
            }
            EntityScope::Entity(id) => self.aggregate([id.as_str()], window, now),
        }
    }
}
