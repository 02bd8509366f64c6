//! Breach history extraction
//!
//! Scans the most recent samples and emits one [`AlertEvent`] per
//! (sample, metric) pair at or above the metric's critical limit.
//! Breaches at 110% of the limit or more escalate to critical.

use crate::models::{AlertEvent, AlertSeverity, Sample};

use super::ThresholdStore;

/// Number of most recent samples scanned, independent of the result limit
pub const SCAN_WINDOW: usize = 40;

/// Default number of events returned
pub const DEFAULT_LIMIT: usize = 12;

/// Ratio of the critical limit at which a breach escalates
pub const ESCALATION_RATIO: f64 = 1.1;

/// Extract breach events, newest first.
///
/// Only the last [`SCAN_WINDOW`] samples (by timestamp) are scanned.
/// Events are collected in chronological order and the most recent
/// `limit` of them are returned in reverse-chronological order. Events
/// sharing a timestamp and metric are never merged.
pub fn extract_breaches(
    samples: &[Sample],
    thresholds: &ThresholdStore,
    limit: usize,
) -> Vec<AlertEvent> {
    if samples.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut ordered: Vec<&Sample> = samples.iter().collect();
    ordered.sort_by_key(|s| s.timestamp);
    let scan = &ordered[ordered.len().saturating_sub(SCAN_WINDOW)..];

    let active: Vec<_> = thresholds.active().collect();
    let mut events = Vec::new();

    for sample in scan {
        for &(metric, critical) in &active {
            let Some(value) = sample.value(metric) else {
                continue;
            };
            if value < critical {
                continue;
            }

            // the store keeps millisecond timestamps, so one id per stored sample
            events.push(AlertEvent {
                id: format!(
                    "{}:{}:{}",
                    sample.entity_id,
                    metric,
                    sample.timestamp.timestamp_millis()
                ),
                entity_id: sample.entity_id.clone(),
                metric_key: metric,
                value,
                threshold: critical,
                severity: escalation(value, critical),
                timestamp: sample.timestamp,
                resolved: false,
            });
        }
    }

    let keep_from = events.len().saturating_sub(limit);
    events.drain(..keep_from);
    events.reverse();
    events
}

fn escalation(value: f64, critical: f64) -> AlertSeverity {
    // critical > 0 is guaranteed by ThresholdStore::active
    if value / critical >= ESCALATION_RATIO {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}

/// Mark events resolved once their entity has recovered.
///
/// An event is resolved when the entity's latest sample is newer than the
/// event and the metric is back under its critical limit (or no longer
/// evaluated at all). Returns the number of events newly resolved.
pub fn resolve_recovered(
    events: &mut [AlertEvent],
    latest: &[Sample],
    thresholds: &ThresholdStore,
) -> usize {
    let mut resolved = 0;

    for event in events.iter_mut().filter(|e| !e.resolved) {
        let Some(current) = latest.iter().find(|s| s.entity_id == event.entity_id) else {
            continue;
        };
        if current.timestamp <= event.timestamp {
            continue;
        }

        let recovered = match (
            thresholds.effective_critical(event.metric_key),
            current.value(event.metric_key),
        ) {
            (Some(critical), Some(value)) => value < critical,
            (None, _) => true,
            (Some(_), None) => false,
        };

        if recovered {
            event.resolve();
            resolved += 1;
        }
    }

    resolved
}
