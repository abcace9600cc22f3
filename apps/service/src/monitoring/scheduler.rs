use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::executor::ProbeExecutor;
use super::types::{ProbeStatus, ProbeVerdict};
use crate::error::{MonitorError, Result};
use crate::registry::{RecordOutcome, Registry};

/// Default period between monitoring cycles.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(30);

/// Default number of probes one cycle runs at once.
pub const DEFAULT_CYCLE_CONCURRENCY: usize = 5;

/// Statistics samples kept in the rolling window.
pub const MAX_STATS_SAMPLES: usize = 50;

/// Aggregate numbers for one monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleStats {
    pub timestamp: DateTime<Utc>,
    pub total_checks: usize,
    pub successful_checks: usize,
    pub failed_checks: usize,
    /// Mean over the checks that reported a latency, rounded
    pub avg_response_time_ms: u64,
    pub up_count: usize,
    pub down_count: usize,
}

impl CycleStats {
    fn from_verdicts(verdicts: &[ProbeVerdict]) -> Self {
        let up = verdicts.iter().filter(|v| v.status.is_up()).count();
        let down = verdicts.len() - up;

        let latencies: Vec<u64> = verdicts.iter().filter_map(|v| v.response_time_ms).collect();
        let avg = if latencies.is_empty() {
            0
        } else {
            (latencies.iter().sum::<u64>() as f64 / latencies.len() as f64).round() as u64
        };

        Self {
            timestamp: Utc::now(),
            total_checks: verdicts.len(),
            successful_checks: up,
            failed_checks: down,
            avg_response_time_ms: avg,
            up_count: up,
            down_count: down,
        }
    }
}

/// Point-in-time view of the scheduler for status endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval_ms: u64,
    pub stats: Vec<CycleStats>,
}

struct ScheduleHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    registry: Arc<Registry>,
    executor: Arc<ProbeExecutor>,
    interval: Mutex<Duration>,
    concurrency: usize,
    handle: Mutex<Option<ScheduleHandle>>,
    /// Last status this scheduler saw per URL, independent of the registry
    last_known: Mutex<HashMap<Uuid, ProbeStatus>>,
    stats: Mutex<VecDeque<CycleStats>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Recurring checker over every enabled URL.
///
/// Two states: stopped (initial) and running. Starting runs one cycle
/// right away and then one per interval; stopping lets the current cycle
/// finish but never begins another. Dropping the last clone stops the loop
/// the same way.
#[derive(Clone)]
pub struct RealtimeScheduler {
    inner: Arc<Inner>,
}

impl RealtimeScheduler {
    pub fn new(registry: Arc<Registry>, executor: Arc<ProbeExecutor>) -> Self {
        Self::with_settings(registry, executor, DEFAULT_CYCLE_INTERVAL, DEFAULT_CYCLE_CONCURRENCY)
    }

    pub fn with_settings(
        registry: Arc<Registry>,
        executor: Arc<ProbeExecutor>,
        interval: Duration,
        concurrency: usize,
    ) -> Self {
        let interval = if interval.is_zero() { DEFAULT_CYCLE_INTERVAL } else { interval };
        Self {
            inner: Arc::new(Inner {
                registry,
                executor,
                interval: Mutex::new(interval),
                concurrency: concurrency.max(1),
                handle: Mutex::new(None),
                last_known: Mutex::new(HashMap::new()),
                stats: Mutex::new(VecDeque::with_capacity(MAX_STATS_SAMPLES)),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.handle).as_ref().is_some_and(|h| !h.task.is_finished())
    }

    pub fn interval(&self) -> Duration {
        *lock(&self.inner.interval)
    }

    /// Start cycling. Returns `false` if already running.
    pub fn start(&self) -> bool {
        let mut handle = lock(&self.inner.handle);
        if handle.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return false;
        }

        let period = *lock(&self.inner.interval);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(Inner::run(Arc::downgrade(&self.inner), period, stop_rx));

        *handle = Some(ScheduleHandle { stop_tx, task });
        info!(interval_ms = period.as_millis() as u64, "Real-time monitoring started");
        true
    }

    /// Stop cycling. Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        let Some(handle) = lock(&self.inner.handle).take() else {
            return false;
        };

        let was_running = !handle.task.is_finished();
        let _ = handle.stop_tx.send(());
        if was_running {
            info!("Real-time monitoring stopped");
        }
        was_running
    }

    /// Change the cycle period, restarting the timer if running.
    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(MonitorError::validation("Monitoring interval must be greater than zero"));
        }

        *lock(&self.inner.interval) = interval;
        if self.stop() {
            self.start();
        }
        Ok(())
    }

    /// Rolling statistics, oldest first.
    pub fn stats(&self) -> Vec<CycleStats> {
        lock(&self.inner.stats).iter().cloned().collect()
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.is_running(),
            interval_ms: self.interval().as_millis() as u64,
            stats: self.stats(),
        }
    }

    /// Run one cycle now, outside the timer.
    pub async fn run_cycle(&self) -> Option<CycleStats> {
        self.inner.run_cycle().await
    }
}

impl Inner {
    /// Holds only a weak reference between ticks. Once the scheduler is
    /// dropped its `stop_tx` goes with it, so `stop_rx` resolves and the
    /// loop ends.
    async fn run(inner: Weak<Self>, period: Duration, mut stop_rx: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.run_cycle().await;
                }
            }
        }

        debug!("Monitoring loop exited");
    }

    async fn run_cycle(self: &Arc<Self>) -> Option<CycleStats> {
        let urls = self.registry.enabled();
        if urls.is_empty() {
            debug!("No enabled URLs, skipping cycle");
            return None;
        }

        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(urls.len());

        for url in &urls {
            let Some(claim) = self.registry.begin_probe(url.id) else {
                debug!(id = %url.id, "Probe in flight elsewhere, skipping this cycle");
                continue;
            };

            let executor = Arc::clone(&self.executor);
            let permits = Arc::clone(&permits);
            handles.push(tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                let verdict = executor.check(claim.url()).await;
                let outcome = claim.complete(&verdict);
                (verdict, outcome)
            }));
        }

        let mut verdicts = Vec::with_capacity(handles.len());
        let mut failed_tasks = 0usize;

        for joined in join_all(handles).await {
            match joined {
                Ok((verdict, Some(outcome))) => {
                    self.track(&outcome);
                    verdicts.push(verdict);
                }
                Ok((verdict, None)) => verdicts.push(verdict),
                Err(e) => {
                    failed_tasks += 1;
                    error!(error = %e, "Probe task failed during cycle");
                }
            }
        }

        self.prune_last_known();

        if failed_tasks > 0 {
            warn!(failed_tasks, "Cycle abandoned, no statistics recorded");
            return None;
        }

        if verdicts.is_empty() {
            return None;
        }

        let sample = CycleStats::from_verdicts(&verdicts);
        debug!(
            total = sample.total_checks,
            up = sample.up_count,
            down = sample.down_count,
            avg_ms = sample.avg_response_time_ms,
            "Monitoring cycle completed"
        );

        let mut stats = lock(&self.stats);
        if stats.len() == MAX_STATS_SAMPLES {
            stats.pop_front();
        }
        stats.push_back(sample.clone());
        Some(sample)
    }

    /// Compare against the scheduler's own memory of each URL.
    ///
    /// The registry emits transitions it can see. When it had no settled
    /// status to compare with (first probe, or the registry was reset), the
    /// scheduler's memory decides instead.
    fn track(&self, outcome: &RecordOutcome) {
        let previous = lock(&self.last_known).insert(outcome.id, outcome.current);

        if outcome.emitted || outcome.previous.settled().is_some() {
            return;
        }

        if let Some(old) = previous.filter(|old| *old != outcome.current) {
            if self.registry.surface_change(outcome.id, old, outcome.current, outcome.response_time_ms) {
                info!(id = %outcome.id, old = %old, new = %outcome.current, "Status change detected");
            }
        }
    }

    fn prune_last_known(&self) {
        lock(&self.last_known).retain(|id, _| self.registry.contains(*id));
    }
}
