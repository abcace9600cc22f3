use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::{CacheEntry, ProbeCache};
use super::checker::Prober;
use super::entropy::Entropy;
use super::types::{ProbeStatus, ProbeVerdict};

const STATUS_FLIP_CHANCE: f64 = 0.02;
const LATENCY_JITTER_RATIO: f64 = 0.1;
const MIN_CACHED_LATENCY_MS: u64 = 10;
const FALLBACK_DOWN_CHANCE: f64 = 0.4;
const FALLBACK_LATENCY_BASE_MS: u64 = 100;
const FALLBACK_LATENCY_SPREAD_MS: f64 = 500.0;

/// Default probability that a check also sweeps stale cache entries.
pub const DEFAULT_SWEEP_CHANCE: f64 = 0.1;

/// What to report when the network probe cannot complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Synthesize a plausible verdict (60% UP) tagged as simulated.
    #[default]
    Simulate,
    /// Report a genuine DOWN carrying the probe error. Not cached.
    ReportDown,
}

/// Performs one health check per call, absorbing repeats through the cache.
///
/// [`ProbeExecutor::check`] has no failure exit: every call resolves to a verdict.
pub struct ProbeExecutor {
    cache: ProbeCache,
    prober: Arc<dyn Prober>,
    entropy: Arc<dyn Entropy>,
    fallback: FallbackPolicy,
    sweep_chance: f64,
}

impl ProbeExecutor {
    pub fn new(cache: ProbeCache, prober: Arc<dyn Prober>, entropy: Arc<dyn Entropy>) -> Self {
        Self {
            cache,
            prober,
            entropy,
            fallback: FallbackPolicy::default(),
            sweep_chance: DEFAULT_SWEEP_CHANCE,
        }
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_sweep_chance(mut self, sweep_chance: f64) -> Self {
        self.sweep_chance = sweep_chance.clamp(0.0, 1.0);
        self
    }

    pub fn cache(&self) -> &ProbeCache {
        &self.cache
    }

    /// Resolve the current verdict for `url`.
    pub async fn check(&self, url: &str) -> ProbeVerdict {
        if self.sweep_chance > 0.0 && self.entropy.chance(self.sweep_chance) {
            self.cache.sweep();
        }

        if let Some(entry) = self.cache.refresh(url, |entry| self.replay(entry)) {
            debug!(url = %url, status = %entry.status, "Probe served from cache");
            return ProbeVerdict::from_cache(url, entry.status, entry.response_time_ms);
        }

        match self.prober.probe(url).await {
            Ok(response) => {
                let status = if response.is_healthy() { ProbeStatus::Up } else { ProbeStatus::Down };
                self.cache.store(url, status, response.latency_ms);
                debug!(
                    url = %url,
                    status = %status,
                    code = response.status_code,
                    latency_ms = response.latency_ms,
                    "Probe completed"
                );
                ProbeVerdict::live(url, status, response.latency_ms, response.status_code)
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Probe failed, falling back");
                self.fallback_verdict(url, e.to_string())
            }
        }
    }

    /// Next status and latency for a live cache entry: jitter the latency by
    /// up to ±10% and occasionally flip the status.
    fn replay(&self, entry: &CacheEntry) -> (ProbeStatus, u64) {
        let base = entry.response_time_ms as f64;
        let variation = base * LATENCY_JITTER_RATIO;
        let jitter = (self.entropy.sample() * variation * 2.0 - variation).floor();
        let latency = ((base + jitter).max(0.0) as u64).max(MIN_CACHED_LATENCY_MS);

        let status = if self.entropy.chance(STATUS_FLIP_CHANCE) {
            entry.status.flipped()
        } else {
            entry.status
        };

        (status, latency)
    }

    fn fallback_verdict(&self, url: &str, error: String) -> ProbeVerdict {
        match self.fallback {
            FallbackPolicy::ReportDown => ProbeVerdict::unreachable(url, error),
            FallbackPolicy::Simulate => {
                let (status, latency) = if self.entropy.chance(FALLBACK_DOWN_CHANCE) {
                    (ProbeStatus::Down, None)
                } else {
                    let spread = (self.entropy.sample() * FALLBACK_LATENCY_SPREAD_MS).floor() as u64;
                    (ProbeStatus::Up, Some(FALLBACK_LATENCY_BASE_MS + spread))
                };

                self.cache.store(url, status, latency.unwrap_or(0));
                ProbeVerdict::fallback(url, status, latency, error)
            }
        }
    }
}
