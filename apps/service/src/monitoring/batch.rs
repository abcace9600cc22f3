use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::executor::ProbeExecutor;
use super::types::ProbeVerdict;
use crate::error::{MonitorError, Result};
use crate::registry::{MonitoredUrl, RecordOutcome, Registry};

/// Probes dispatched together in one window.
pub const DEFAULT_BATCH_WIDTH: usize = 5;

/// Pause between consecutive windows.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(1);

/// What one `check_all` pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Probes dispatched per window, in window order
    pub windows: Vec<usize>,
    pub probed: usize,
    /// URLs skipped because a probe for them was already in flight
    pub skipped: usize,
    /// Results dropped because their URL was removed mid-probe
    pub discarded: usize,
}

/// Runs the executor over a list of URLs in fixed-width windows.
pub struct BatchChecker {
    registry: Arc<Registry>,
    executor: Arc<ProbeExecutor>,
    width: usize,
    pause: Duration,
}

impl BatchChecker {
    pub fn new(registry: Arc<Registry>, executor: Arc<ProbeExecutor>) -> Self {
        Self { registry, executor, width: DEFAULT_BATCH_WIDTH, pause: DEFAULT_BATCH_PAUSE }
    }

    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Check every URL in `urls`, preserving their order across windows.
    ///
    /// Each window runs its probes concurrently and waits for all of them
    /// before the pause. A URL already being probed elsewhere is skipped;
    /// a window left with nothing to dispatch is neither recorded nor paused.
    /// Only a crashed probe task fails the pass; the remaining windows are
    /// then abandoned and their claims released.
    pub async fn check_all(&self, urls: &[MonitoredUrl]) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let window_count = urls.len().div_ceil(self.width);

        for (index, window) in urls.chunks(self.width).enumerate() {
            let mut tasks: JoinSet<(ProbeVerdict, Option<RecordOutcome>)> = JoinSet::new();

            for url in window {
                let Some(claim) = self.registry.begin_probe(url.id) else {
                    report.skipped += 1;
                    continue;
                };

                let executor = Arc::clone(&self.executor);
                tasks.spawn(async move {
                    let verdict = executor.check(claim.url()).await;
                    let outcome = claim.complete(&verdict);
                    (verdict, outcome)
                });
            }

            if tasks.is_empty() {
                debug!(window = index + 1, of = window_count, "Every URL in window already in flight");
                continue;
            }

            report.windows.push(tasks.len());
            debug!(window = index + 1, of = window_count, probes = tasks.len(), "Dispatched batch window");

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Some(_))) => report.probed += 1,
                    Ok((verdict, None)) => {
                        report.probed += 1;
                        report.discarded += 1;
                        debug!(url = %verdict.url, "Result arrived after removal");
                    }
                    Err(e) => {
                        error!(window = index + 1, error = %e, "Probe task failed, abandoning batch");
                        return Err(MonitorError::Internal(format!("probe task failed: {e}")));
                    }
                }
            }

            if index + 1 < window_count && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        info!(
            windows = report.windows.len(),
            probed = report.probed,
            skipped = report.skipped,
            "Batch check completed"
        );
        Ok(report)
    }
}
