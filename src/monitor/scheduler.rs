//! Fixed-interval tick scheduling.
//!
//! The scheduler is a two-state machine (Idle / TickRunning) guarded by
//! [`TickGuard`]. A firing that finds a tick still running is dropped, not
//! queued, so probe fan-out never stacks up. Tick failures and panics are
//! logged and the loop keeps going until shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    /// No tick in progress.
    Idle,
    /// A tick is executing.
    TickRunning,
}

/// Admits at most one tick at a time.
#[derive(Debug, Clone, Default)]
pub struct TickGuard {
    running: Arc<AtomicBool>,
}

impl TickGuard {
    /// Create an idle guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transition Idle → TickRunning. Returns `None` if a tick is running.
    ///
    /// The returned permit moves the guard back to Idle when dropped,
    /// including during a panic unwind.
    pub fn try_begin(&self) -> Option<TickPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit {
                running: Arc::clone(&self.running),
            })
    }

    /// Current state.
    pub fn state(&self) -> TickState {
        if self.running.load(Ordering::Acquire) {
            TickState::TickRunning
        } else {
            TickState::Idle
        }
    }
}

/// Held for the duration of one tick.
#[derive(Debug)]
pub struct TickPermit {
    running: Arc<AtomicBool>,
}

impl Drop for TickPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Work executed on every tick.
#[async_trait]
pub trait TickRunner: Send + Sync + 'static {
    /// Run one full tick.
    async fn run_tick(&self) -> anyhow::Result<()>;
}

/// Counters returned when the scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Ticks started.
    pub started: u64,
    /// Firings dropped because a tick was running.
    pub skipped: u64,
    /// Ticks that returned an error or panicked.
    pub failed: u64,
}

/// Run ticks every `interval` until `shutdown_rx` flips to `true` or closes.
///
/// The first tick fires one interval after start. On shutdown the loop
/// waits for the in-flight tick before returning.
pub async fn run_scheduler<R: TickRunner>(
    runner: Arc<R>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> SchedulerStats {
    info!(interval_secs = interval.as_secs(), "scheduler started");

    let guard = TickGuard::new();
    let mut stats = SchedulerStats::default();
    let mut in_flight = InFlightTick::default();

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // Skip the first immediate tick.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                in_flight.reap_finished(&mut stats).await;

                let Some(permit) = guard.try_begin() else {
                    stats.skipped = stats.skipped.saturating_add(1);
                    debug!("previous tick still running, skipping");
                    continue;
                };

                stats.started = stats.started.saturating_add(1);
                let runner = Arc::clone(&runner);
                let handle = tokio::spawn(async move {
                    let _permit = permit;
                    runner.run_tick().await
                });
                in_flight.track(handle, &mut stats).await;
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    in_flight.drain(&mut stats).await;

    info!(
        started = stats.started,
        skipped = stats.skipped,
        failed = stats.failed,
        "scheduler stopped"
    );
    stats
}

/// Task handle of the most recently spawned tick.
///
/// Every tracked handle is awaited exactly once, so a tick's error or panic
/// is always logged and counted.
#[derive(Debug, Default)]
pub struct InFlightTick {
    handle: Option<JoinHandle<anyhow::Result<()>>>,
}

impl InFlightTick {
    /// Collect the tracked tick if its task has finished.
    pub async fn reap_finished(&mut self, stats: &mut SchedulerStats) {
        if self.handle.as_ref().is_some_and(JoinHandle::is_finished) {
            self.drain(stats).await;
        }
    }

    /// Track `handle`, collecting any earlier tick first.
    ///
    /// The earlier tick has already released the guard by the time a new
    /// one is admitted, so only its task teardown is waited on.
    pub async fn track(
        &mut self,
        handle: JoinHandle<anyhow::Result<()>>,
        stats: &mut SchedulerStats,
    ) {
        if let Some(previous) = self.handle.replace(handle) {
            reap(previous, stats).await;
        }
    }

    /// Wait for the tracked tick, if any.
    pub async fn drain(&mut self, stats: &mut SchedulerStats) {
        if let Some(handle) = self.handle.take() {
            reap(handle, stats).await;
        }
    }
}

async fn reap(handle: JoinHandle<anyhow::Result<()>>, stats: &mut SchedulerStats) {
    match handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            stats.failed = stats.failed.saturating_add(1);
            error!(error = %e, "monitoring tick failed");
        }
        Err(e) => {
            stats.failed = stats.failed.saturating_add(1);
            error!(error = %e, "monitoring tick panicked");
        }
    }
}

/// Whether `now` falls inside the report window for `(hour, minute)`.
///
/// The window spans one check interval (at least one minute) from the
/// target time so a coarse interval cannot step over it.
pub fn is_report_time<Tz: TimeZone>(
    now: &DateTime<Tz>,
    (hour, minute): (u32, u32),
    interval: Duration,
) -> bool {
    let target_mins = hour.saturating_mul(60).saturating_add(minute);
    let current_mins = now.hour().saturating_mul(60).saturating_add(now.minute());
    let window = u32::try_from(interval.as_secs() / 60).unwrap_or(u32::MAX).max(1);
    current_mins >= target_mins && current_mins < target_mins.saturating_add(window)
}

/// Fires at most once per calendar day.
#[derive(Debug, Default)]
pub struct DailyLatch {
    last: Mutex<Option<NaiveDate>>,
}

impl DailyLatch {
    /// Create an unfired latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time it is called for `date`.
    pub fn try_fire(&self, date: NaiveDate) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        if *last == Some(date) {
            return false;
        }
        *last = Some(date);
        true
    }
}
