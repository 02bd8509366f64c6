//! Live refresh scheduling
//!
//! The scheduler owns the refresh target behind a mutex and drives it from
//! a tokio timer task while in live mode. Every state change that cancels
//! a timer bumps a generation counter under that same mutex, so once
//! `set_mode`, `set_interval` or `shutdown` returns no tick from the old
//! timer can touch the target.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Something the scheduler can refresh
pub trait Refreshable: Send + 'static {
    fn refresh(&mut self) -> Result<TickReport>;
}

/// Outcome of a single refresh tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub appended: usize,
    pub rejected: usize,
    /// Monitored entities that produced no sample
    pub missing: usize,
    pub open_alerts: usize,
}

impl TickReport {
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            at,
            appended: 0,
            rejected: 0,
            missing: 0,
            open_alerts: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    Live,
    #[default]
    Manual,
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshMode::Live => write!(f, "live"),
            RefreshMode::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for RefreshMode {
    type Err = MonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(RefreshMode::Live),
            "manual" => Ok(RefreshMode::Manual),
            other => Err(MonitorError::UnknownMode(other.to_string())),
        }
    }
}

/// Supported live refresh periods. Serialized as whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum RefreshInterval {
    OneSecond,
    TwoSeconds,
    #[default]
    FiveSeconds,
    TenSeconds,
    ThirtySeconds,
}

impl RefreshInterval {
    pub const ALL: [RefreshInterval; 5] = [
        RefreshInterval::OneSecond,
        RefreshInterval::TwoSeconds,
        RefreshInterval::FiveSeconds,
        RefreshInterval::TenSeconds,
        RefreshInterval::ThirtySeconds,
    ];

    pub fn as_secs(&self) -> u64 {
        match self {
            RefreshInterval::OneSecond => 1,
            RefreshInterval::TwoSeconds => 2,
            RefreshInterval::FiveSeconds => 5,
            RefreshInterval::TenSeconds => 10,
            RefreshInterval::ThirtySeconds => 30,
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.as_secs())
    }
}

impl TryFrom<u64> for RefreshInterval {
    type Error = MonitorError;

    fn try_from(secs: u64) -> std::result::Result<Self, Self::Error> {
        RefreshInterval::ALL
            .into_iter()
            .find(|i| i.as_secs() == secs)
            .ok_or_else(|| MonitorError::InvalidInterval(format!("{secs}s")))
    }
}

impl From<RefreshInterval> for u64 {
    fn from(interval: RefreshInterval) -> Self {
        interval.as_secs()
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

impl FromStr for RefreshInterval {
    type Err = MonitorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_suffix('s').unwrap_or(trimmed);
        let secs: u64 = digits
            .parse()
            .map_err(|_| MonitorError::InvalidInterval(trimmed.to_string()))?;
        RefreshInterval::try_from(secs)
    }
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub mode: RefreshMode,
    pub interval_secs: u64,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub ticks: u64,
    pub tick_errors: u64,
    /// Errors since the last successful tick
    pub consecutive_errors: u64,
}

struct Shared<T> {
    target: T,
    generation: u64,
    mode: RefreshMode,
    interval: RefreshInterval,
    last_refresh_at: Option<DateTime<Utc>>,
    ticks: u64,
    tick_errors: u64,
    consecutive_errors: u64,
}

impl<T: Refreshable> Shared<T> {
    fn tick(&mut self) -> Result<TickReport> {
        match self.target.refresh() {
            Ok(report) => {
                self.last_refresh_at = Some(report.at);
                self.ticks += 1;
                self.consecutive_errors = 0;
                Ok(report)
            }
            Err(e) => {
                MonitorMetrics::new().inc_tick_errors();
                self.tick_errors += 1;
                self.consecutive_errors += 1;
                warn!(error = %e, consecutive = self.consecutive_errors, "Refresh tick failed");
                Err(e)
            }
        }
    }
}

struct Timer {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Timer {
    fn cancel(self) {
        let _ = self.shutdown.send(());
        self.task.abort();
    }
}

/// Drives a [`Refreshable`] in live or manual mode.
///
/// Cloning yields another handle to the same scheduler.
pub struct RefreshScheduler<T> {
    shared: Arc<Mutex<Shared<T>>>,
    timer: Arc<Mutex<Option<Timer>>>,
    logger: StructuredLogger,
}

impl<T> Clone for RefreshScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            timer: Arc::clone(&self.timer),
            logger: self.logger.clone(),
        }
    }
}

fn lock<S>(mutex: &Mutex<S>) -> MutexGuard<'_, S> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Refreshable> RefreshScheduler<T> {
    /// Create a scheduler in manual mode
    pub fn new(target: T, interval: RefreshInterval, logger: StructuredLogger) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                target,
                generation: 0,
                mode: RefreshMode::Manual,
                interval,
                last_refresh_at: None,
                ticks: 0,
                tick_errors: 0,
                consecutive_errors: 0,
            })),
            timer: Arc::new(Mutex::new(None)),
            logger,
        }
    }

    pub fn mode(&self) -> RefreshMode {
        lock(&self.shared).mode
    }

    pub fn interval(&self) -> RefreshInterval {
        lock(&self.shared).interval
    }

    pub fn status(&self) -> SchedulerStatus {
        let shared = lock(&self.shared);
        SchedulerStatus {
            mode: shared.mode,
            interval_secs: shared.interval.as_secs(),
            last_refresh_at: shared.last_refresh_at,
            ticks: shared.ticks,
            tick_errors: shared.tick_errors,
            consecutive_errors: shared.consecutive_errors,
        }
    }

    /// Run `f` against the target with ticks excluded
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut shared = lock(&self.shared);
        f(&mut shared.target)
    }

    /// Switch between live and manual refresh.
    ///
    /// Entering live mode ticks immediately and then every interval.
    /// Leaving it cancels the timer with no further ticks. Setting the
    /// current mode again is a no-op. Must be called within a tokio runtime.
    pub fn set_mode(&self, mode: RefreshMode) -> Option<Result<TickReport>> {
        let mut timer = lock(&self.timer);
        let mut shared = lock(&self.shared);
        if shared.mode == mode {
            return None;
        }

        shared.mode = mode;
        shared.generation += 1;
        self.logger.log_mode_changed(mode, shared.interval.as_secs());

        match mode {
            RefreshMode::Live => {
                let first = shared.tick();
                let generation = shared.generation;
                let period = shared.interval.period();
                drop(shared);

                if let Some(old) = timer.take() {
                    old.cancel();
                }
                *timer = Some(self.spawn_timer(generation, period));
                Some(first)
            }
            RefreshMode::Manual => {
                drop(shared);
                if let Some(old) = timer.take() {
                    old.cancel();
                }
                None
            }
        }
    }

    /// Change the live period. While live the countdown restarts from the
    /// new value without an immediate tick.
    pub fn set_interval(&self, interval: RefreshInterval) {
        let mut timer = lock(&self.timer);
        let mut shared = lock(&self.shared);
        if shared.interval == interval {
            return;
        }
        shared.interval = interval;
        info!(interval_secs = interval.as_secs(), "Refresh interval changed");

        if shared.mode != RefreshMode::Live {
            return;
        }

        shared.generation += 1;
        let generation = shared.generation;
        drop(shared);

        if let Some(old) = timer.take() {
            old.cancel();
        }
        *timer = Some(self.spawn_timer(generation, interval.period()));
    }

    /// Perform one tick now, in either mode. Does not move the live timer.
    pub fn refresh_now(&self) -> Result<TickReport> {
        lock(&self.shared).tick()
    }

    /// Stop any live timer and fall back to manual mode
    pub fn shutdown(&self) {
        let mut timer = lock(&self.timer);
        {
            let mut shared = lock(&self.shared);
            shared.generation += 1;
            shared.mode = RefreshMode::Manual;
        }
        if let Some(old) = timer.take() {
            old.cancel();
        }
        debug!("Refresh scheduler stopped");
    }

    fn spawn_timer(&self, generation: u64, period: Duration) -> Timer {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let mut shutdown_rx = shutdown_rx;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !fire(&shared, generation) {
                            break;
                        }
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }
            debug!(generation, "Refresh timer exited");
        });

        Timer {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// One timer tick. Returns false once the timer's generation is stale.
fn fire<T: Refreshable>(shared: &Mutex<Shared<T>>, generation: u64) -> bool {
    let mut shared = lock(shared);
    if shared.generation != generation {
        return false;
    }
    // failures are logged and counted inside tick; the loop carries on
    let _ = shared.tick();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Counts refreshes; fails every call when `fail` is set
    #[derive(Clone, Default)]
    struct Counter {
        calls: Arc<AtomicU64>,
        fail: bool,
    }

    impl Refreshable for Counter {
        fn refresh(&mut self) -> Result<TickReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(MonitorError::UnknownEntity("gone".into()));
            }
            Ok(TickReport::empty(Utc::now()))
        }
    }

    fn scheduler(counter: &Counter, interval: RefreshInterval) -> RefreshScheduler<Counter> {
        RefreshScheduler::new(counter.clone(), interval, StructuredLogger::new("test"))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_to_manual_stops_automatic_ticks() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::OneSecond);

        s.set_mode(RefreshMode::Live);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);

        s.set_mode(RefreshMode::Manual);
        tokio::time::sleep(ms(3000)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.mode(), RefreshMode::Manual);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_ticks_every_interval() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::OneSecond);

        s.set_mode(RefreshMode::Live);
        tokio::time::sleep(ms(3500)).await;

        // immediate tick plus 1s, 2s, 3s
        assert_eq!(counter.calls.load(Ordering::SeqCst), 4);
        assert_eq!(s.status().ticks, 4);
        assert!(s.status().last_refresh_at.is_some());
        s.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_restarts_countdown() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::OneSecond);

        s.set_mode(RefreshMode::Live);
        tokio::time::sleep(ms(1500)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        s.set_interval(RefreshInterval::FiveSeconds);
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(ms(4000)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(ms(1100)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
        s.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_runs_one_tick() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::TwoSeconds);

        let report = s.refresh_now().unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.status().last_refresh_at, Some(report.at));

        tokio::time::sleep(ms(10_000)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_in_live_mode_keeps_phase() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::TwoSeconds);

        s.set_mode(RefreshMode::Live);
        tokio::time::sleep(ms(500)).await;
        s.refresh_now().unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);

        // timer still fires at 2s from going live
        tokio::time::sleep(ms(1600)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
        s.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_do_not_stop_the_loop() {
        let counter = Counter {
            fail: true,
            ..Counter::default()
        };
        let s = scheduler(&counter, RefreshInterval::OneSecond);

        let first = s.set_mode(RefreshMode::Live);
        assert!(matches!(first, Some(Err(_))));

        tokio::time::sleep(ms(2500)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);

        let status = s.status();
        assert_eq!(status.ticks, 0);
        assert_eq!(status.tick_errors, 3);
        assert_eq!(status.consecutive_errors, 3);
        assert_eq!(status.last_refresh_at, None);
        s.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_setting_same_mode_is_noop() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::OneSecond);

        assert!(s.set_mode(RefreshMode::Manual).is_none());
        assert!(s.set_mode(RefreshMode::Live).is_some());
        assert!(s.set_mode(RefreshMode::Live).is_none());
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        s.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_timer() {
        let counter = Counter::default();
        let s = scheduler(&counter, RefreshInterval::OneSecond);

        s.set_mode(RefreshMode::Live);
        s.shutdown();
        tokio::time::sleep(ms(5000)).await;
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(s.mode(), RefreshMode::Manual);
    }

    #[test]
    fn test_interval_parsing() {
        assert_eq!("5s".parse::<RefreshInterval>().unwrap(), RefreshInterval::FiveSeconds);
        assert_eq!("30".parse::<RefreshInterval>().unwrap(), RefreshInterval::ThirtySeconds);
        assert!(matches!(
            "3s".parse::<RefreshInterval>(),
            Err(MonitorError::InvalidInterval(_))
        ));
        assert_eq!(RefreshInterval::default().as_secs(), 5);

        let json = serde_json::to_string(&RefreshInterval::TenSeconds).unwrap();
        assert_eq!(json, "10");
        assert!(serde_json::from_str::<RefreshInterval>("7").is_err());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("LIVE".parse::<RefreshMode>().unwrap(), RefreshMode::Live);
        assert!(matches!("paused".parse::<RefreshMode>(), Err(MonitorError::UnknownMode(_))));
        assert_eq!(RefreshMode::default(), RefreshMode::Manual);
    }
}
