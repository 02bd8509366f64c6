//! Metric sources
//!
//! A [`MetricSource`] produces one sample per entity per tick. The only
//! bundled implementation is [`SyntheticSource`], a seeded bounded random
//! walk used for demos and tests.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::models::{Entity, Sample};
use crate::store::MetricStore;

/// Produces samples for monitored entities
pub trait MetricSource: Send {
    /// Sample `entity` at `at`. `None` means the entity did not report.
    fn sample(&mut self, entity: &Entity, at: DateTime<Utc>) -> Option<Sample>;

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Bounds and per-tick step of one random-walk channel
#[derive(Debug, Clone, Copy)]
struct Channel {
    min: f64,
    max: f64,
    step: f64,
}

impl Channel {
    const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    fn start(&self, rng: &mut StdRng) -> f64 {
        // Start in the lower half so fresh fleets look mostly healthy
        rng.gen_range(self.min..=(self.min + (self.max - self.min) * 0.5))
    }

    fn walk(&self, current: f64, rng: &mut StdRng) -> f64 {
        let delta = rng.gen_range(-self.step..=self.step);
        (current + delta).clamp(self.min, self.max)
    }
}

const CPU: Channel = Channel::new(2.0, 100.0, 6.0);
const MEMORY: Channel = Channel::new(15.0, 98.0, 3.0);
const DISK: Channel = Channel::new(10.0, 99.0, 0.8);
const NETWORK: Channel = Channel::new(0.5, 150.0, 8.0);
const RESPONSE_TIME: Channel = Channel::new(40.0, 1500.0, 45.0);
const ERROR_RATE: Channel = Channel::new(0.0, 10.0, 0.4);
const CONNECTIONS: Channel = Channel::new(0.0, 1200.0, 40.0);

#[derive(Debug, Clone, Copy)]
struct WalkState {
    cpu: f64,
    memory: f64,
    disk: f64,
    network: f64,
    response_time: f64,
    error_rate: f64,
    connections: f64,
}

impl WalkState {
    fn seed(rng: &mut StdRng) -> Self {
        Self {
            cpu: CPU.start(rng),
            memory: MEMORY.start(rng),
            disk: DISK.start(rng),
            network: NETWORK.start(rng),
            response_time: RESPONSE_TIME.start(rng),
            error_rate: ERROR_RATE.start(rng) * 0.3,
            connections: CONNECTIONS.start(rng),
        }
    }

    fn step(&mut self, rng: &mut StdRng) {
        self.cpu = CPU.walk(self.cpu, rng);
        self.memory = MEMORY.walk(self.memory, rng);
        self.disk = DISK.walk(self.disk, rng);
        self.network = NETWORK.walk(self.network, rng);
        self.response_time = RESPONSE_TIME.walk(self.response_time, rng);
        self.error_rate = ERROR_RATE.walk(self.error_rate, rng);
        self.connections = CONNECTIONS.walk(self.connections, rng);
    }
}

/// Deterministic bounded random walk per entity and metric
#[derive(Debug)]
pub struct SyntheticSource {
    rng: StdRng,
    walks: HashMap<String, WalkState>,
    report_connections: bool,
}

impl SyntheticSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            walks: HashMap::new(),
            report_connections: true,
        }
    }

    /// Omit `activeConnections` from produced samples
    pub fn without_connections(mut self) -> Self {
        self.report_connections = false;
        self
    }
}

impl MetricSource for SyntheticSource {
    fn sample(&mut self, entity: &Entity, at: DateTime<Utc>) -> Option<Sample> {
        let rng = &mut self.rng;
        let state = match self.walks.get_mut(&entity.id) {
            Some(state) => {
                state.step(rng);
                *state
            }
            None => {
                let state = WalkState::seed(rng);
                self.walks.insert(entity.id.clone(), state);
                state
            }
        };

        // Traffic loosely follows the number of open connections
        let request_count = (state.connections * rng.gen_range(0.5..1.5)).round() as u64;

        Some(Sample {
            entity_id: entity.id.clone(),
            timestamp: at,
            cpu: state.cpu,
            memory: state.memory,
            disk: state.disk,
            network: state.network,
            response_time: state.response_time,
            request_count,
            error_rate: state.error_rate,
            active_connections: self
                .report_connections
                .then(|| state.connections.round() as u32),
        })
    }
}

/// Result of a history backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub appended: usize,
    pub rejected: usize,
}

/// Seed history for every monitored entity over `[end - span, end)`.
///
/// Samples are taken every `step`; the slot at `end` itself is left for
/// the first live tick. Rejected appends are logged and counted.
pub fn backfill(
    store: &mut MetricStore,
    source: &mut dyn MetricSource,
    end: DateTime<Utc>,
    span: Duration,
    step: Duration,
) -> BackfillReport {
    let mut report = BackfillReport::default();
    if step <= Duration::zero() || span <= Duration::zero() {
        return report;
    }

    let entities: Vec<Entity> = store.monitored().cloned().collect();
    let mut at = end - span;

    while at < end {
        for entity in &entities {
            let Some(sample) = source.sample(entity, at) else {
                continue;
            };
            match store.append(&entity.id, sample) {
                Ok(_) => report.appended += 1,
                Err(e) => {
                    warn!(entity = %entity.id, error = %e, "Backfill sample rejected");
                    report.rejected += 1;
                }
            }
        }
        at += step;
    }

    debug!(
        appended = report.appended,
        rejected = report.rejected,
        source = source.name(),
        "Backfill complete"
    );
    report
}
