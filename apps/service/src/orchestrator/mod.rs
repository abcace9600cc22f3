/// Orchestrator - the single entry point outer layers call into
///
/// Wires the cache, executor, registry, batch checker, and scheduler
/// together from configuration and exposes the boundary operations:
/// one-off checks, URL management, check-all, scheduler control,
/// history summaries, health, and snapshot persistence.


use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::Monitoring;
use crate::database::{Database, JsonFileDatabase};
use crate::error::{MonitorError, Result};
use crate::monitoring::{
    BatchChecker, BatchReport, Entropy, HttpProber, ProbeCache, ProbeExecutor, ProbeVerdict, Prober,
    RealtimeScheduler, SchedulerStatus,
};
use crate::registry::{
    BulkAddReport, HistorySummary, MonitoredUrl, RecordOutcome, Registry, StatusChange, StatusEvents, TimeRange,
    UrlSettings,
};
use crate::validation::normalize_url;

/// Delay between the first probes of URLs added together.
pub const BULK_PROBE_STAGGER: Duration = Duration::from_millis(500);

/// Liveness report for the service itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub version: &'static str,
    pub monitored_urls: usize,
    pub scheduler_running: bool,
}

/// Cheap to clone; every clone drives the same registry and scheduler.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<Registry>,
    executor: Arc<ProbeExecutor>,
    batch: Arc<BatchChecker>,
    scheduler: RealtimeScheduler,
    database: Option<Arc<dyn Database>>,
    started_at: Instant,
}

impl Orchestrator {
    /// Build with the real HTTP prober and, if configured, the JSON snapshot.
    pub fn from_config(config: &Monitoring) -> Result<Self> {
        let prober = HttpProber::new(config.probe_timeout())
            .map_err(|e| MonitorError::Internal(format!("failed to build HTTP client: {e}")))?;

        let mut orchestrator = Self::with_parts(config, Arc::new(prober), config.entropy());

        if let Some(path) = &config.snapshot_path {
            let database = JsonFileDatabase::new(path).with_history_limit(config.persisted_history_limit);
            orchestrator = orchestrator.with_database(Arc::new(database));
        }

        Ok(orchestrator)
    }

    pub fn with_parts(config: &Monitoring, prober: Arc<dyn Prober>, entropy: Arc<dyn Entropy>) -> Self {
        let registry = Arc::new(
            Registry::new(StatusEvents::default())
                .with_history_limit(config.history_limit)
                .with_bulk_limit(config.bulk_limit),
        );

        let executor = Arc::new(
            ProbeExecutor::new(ProbeCache::new(config.cache_ttl()), prober, entropy)
                .with_fallback(config.fallback_policy)
                .with_sweep_chance(config.cache_sweep_chance),
        );

        let batch = Arc::new(
            BatchChecker::new(Arc::clone(&registry), Arc::clone(&executor))
                .with_width(config.batch_width)
                .with_pause(config.batch_pause()),
        );

        let scheduler = RealtimeScheduler::with_settings(
            Arc::clone(&registry),
            Arc::clone(&executor),
            config.interval(),
            config.cycle_concurrency,
        );

        Self { registry, executor, batch, scheduler, database: None, started_at: Instant::now() }
    }

    pub fn with_database(mut self, database: Arc<dyn Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn scheduler(&self) -> &RealtimeScheduler {
        &self.scheduler
    }

    /// Stream of UP/DOWN transitions for notifiers.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.registry.events().subscribe()
    }

    /// Check one URL right now, outside the registry.
    pub async fn check_url(&self, url: &str) -> Result<ProbeVerdict> {
        let url = normalize_url(url)?;
        Ok(self.executor.check(&url).await)
    }

    /// Start monitoring `url` and probe it straight away.
    pub fn add_monitored_url(&self, url: &str) -> Result<MonitoredUrl> {
        let monitored = self.registry.add(url)?;
        self.spawn_probe(monitored.id, Duration::ZERO);
        Ok(monitored)
    }

    /// Add several URLs; each new one is probed 500ms after the previous.
    pub fn add_bulk(&self, candidates: &[String]) -> Result<BulkAddReport> {
        let report = self.registry.add_bulk(candidates)?;

        for (index, url) in report.added.iter().enumerate() {
            self.spawn_probe(url.id, BULK_PROBE_STAGGER * index as u32);
        }

        Ok(report)
    }

    /// Stop monitoring `id`. Unknown ids return `false`.
    pub fn remove_monitored_url(&self, id: Uuid) -> bool {
        self.registry.remove(id)
    }

    pub fn list(&self) -> Vec<MonitoredUrl> {
        self.registry.list()
    }

    pub fn get(&self, id: Uuid) -> Option<MonitoredUrl> {
        self.registry.get(id)
    }

    pub fn update_settings(&self, id: Uuid, settings: UrlSettings) -> Result<Option<MonitoredUrl>> {
        self.registry.update_settings(id, settings)
    }

    pub fn summary(&self, id: Uuid, range: TimeRange) -> Option<HistorySummary> {
        self.registry.get(id).map(|url| url.history.summarize(range, Utc::now()))
    }

    /// Batch-check the given URLs and wait for the result.
    pub async fn check_all(&self, urls: &[MonitoredUrl]) -> Result<BatchReport> {
        self.batch.check_all(urls).await
    }

    /// Batch-check every enabled URL in the background.
    pub fn check_all_now(&self) -> JoinHandle<Result<BatchReport>> {
        let urls = self.registry.enabled();
        let batch = Arc::clone(&self.batch);
        info!(count = urls.len(), "Checking all enabled URLs");

        tokio::spawn(async move {
            let report = batch.check_all(&urls).await;
            if let Err(e) = &report {
                error!(error = %e, "Check-all pass failed");
            }
            report
        })
    }

    pub fn start_monitoring(&self) -> bool {
        self.scheduler.start()
    }

    pub fn stop_monitoring(&self) -> bool {
        self.scheduler.stop()
    }

    pub fn set_monitoring_interval(&self, interval: Duration) -> Result<()> {
        self.scheduler.set_interval(interval)
    }

    pub fn monitoring_status(&self) -> SchedulerStatus {
        self.scheduler.status()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy",
            timestamp: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION"),
            monitored_urls: self.registry.len(),
            scheduler_running: self.scheduler.is_running(),
        }
    }

    /// Replace the registry with the persisted snapshot, if one is configured.
    pub async fn restore(&self) -> Result<usize> {
        let Some(database) = &self.database else {
            return Ok(0);
        };

        let urls = database.load_urls().await?;
        let count = urls.len();
        self.registry.replace_all(urls);
        Ok(count)
    }

    /// Write the registry to the snapshot, if one is configured.
    pub async fn persist(&self) -> Result<()> {
        match &self.database {
            Some(database) => database.save_urls(&self.registry.list()).await,
            None => Ok(()),
        }
    }

    fn spawn_probe(&self, id: Uuid, delay: Duration) -> JoinHandle<Option<RecordOutcome>> {
        let registry = Arc::clone(&self.registry);
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let Some(claim) = registry.begin_probe(id) else {
                debug!(id = %id, "Initial probe skipped, URL gone or already in flight");
                return None;
            };

            let verdict = executor.check(claim.url()).await;
            claim.complete(&verdict)
        })
    }
}
