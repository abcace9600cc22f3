//! Most-recent-verdict cache keyed by raw URL string.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::types::ProbeStatus;

/// Default lifetime of a cached verdict.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Last known verdict for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub url: String,
    pub status: ProbeStatus,
    pub response_time_ms: u64,
    pub last_updated: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_updated) < ttl
    }
}

/// Thread-safe TTL cache of probe verdicts.
///
/// Staleness is decided on every read; [`ProbeCache::sweep`] only reclaims memory.
#[derive(Debug)]
pub struct ProbeCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl ProbeCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), ttl }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live entry for `url`, or `None` if absent or older than the TTL.
    pub fn lookup(&self, url: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        self.entries().get(url).filter(|entry| entry.is_live(now, self.ttl)).cloned()
    }

    /// Record a verdict for `url`, replacing whatever was there.
    pub fn store(&self, url: &str, status: ProbeStatus, response_time_ms: u64) -> CacheEntry {
        let mut entries = self.entries();
        Self::write(&mut entries, url, status, response_time_ms)
    }

    /// Atomically derive a new verdict from the live entry for `url`.
    ///
    /// `derive` sees the current entry and returns the status and latency to
    /// store in its place. Returns `None` without calling `derive` when there
    /// is no live entry.
    pub fn refresh<F>(&self, url: &str, derive: F) -> Option<CacheEntry>
    where
        F: FnOnce(&CacheEntry) -> (ProbeStatus, u64),
    {
        let now = Instant::now();
        let mut entries = self.entries();
        let current = entries.get(url).filter(|entry| entry.is_live(now, self.ttl))?;
        let (status, response_time_ms) = derive(current);
        Some(Self::write(&mut entries, url, status, response_time_ms))
    }

    fn write(
        entries: &mut HashMap<String, CacheEntry>,
        url: &str,
        status: ProbeStatus,
        response_time_ms: u64,
    ) -> CacheEntry {
        let now = Instant::now();
        // Writes to one key must carry strictly increasing timestamps, even
        // when the clock has not moved between them.
        let last_updated = match entries.get(url) {
            Some(previous) if previous.last_updated >= now => {
                previous.last_updated + Duration::from_nanos(1)
            }
            _ => now,
        };

        let entry = CacheEntry { url: url.to_string(), status, response_time_ms, last_updated };
        entries.insert(url.to_string(), entry.clone());
        entry
    }

    /// Drop every stale entry and return how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now, self.ttl));
        let removed = before - entries.len();

        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Swept stale probe cache entries");
        }

        removed
    }

    /// Number of entries held, stale ones included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com";

    #[tokio::test(start_paused = true)]
    async fn test_lookup_respects_ttl() {
        let cache = ProbeCache::default();
        cache.store(URL, ProbeStatus::Up, 120);

        tokio::time::advance(DEFAULT_CACHE_TTL - Duration::from_millis(1)).await;
        let entry = cache.lookup(URL).expect("entry should still be live");
        assert_eq!(entry.status, ProbeStatus::Up);
        assert_eq!(entry.response_time_ms, 120);

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(cache.lookup(URL).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_hidden_without_sweep() {
        let cache = ProbeCache::new(Duration::from_secs(1));
        cache.store(URL, ProbeStatus::Down, 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.lookup(URL).is_none());
        assert_eq!(cache.len(), 1);
        assert!(cache.refresh(URL, |_| (ProbeStatus::Up, 1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_stale() {
        let cache = ProbeCache::new(Duration::from_secs(10));
        cache.store("https://old.example.com", ProbeStatus::Up, 50);

        tokio::time::advance(Duration::from_secs(8)).await;
        cache.store("https://new.example.com", ProbeStatus::Up, 50);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("https://new.example.com").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_updated_strictly_increases() {
        let cache = ProbeCache::default();
        let first = cache.store(URL, ProbeStatus::Up, 100);
        let second = cache.store(URL, ProbeStatus::Up, 110);
        let third = cache.refresh(URL, |entry| (entry.status, entry.response_time_ms)).unwrap();

        assert!(second.last_updated > first.last_updated);
        assert!(third.last_updated > second.last_updated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_extends_lifetime() {
        let cache = ProbeCache::new(Duration::from_secs(10));
        cache.store(URL, ProbeStatus::Up, 100);

        tokio::time::advance(Duration::from_secs(9)).await;
        let refreshed = cache.refresh(URL, |entry| (entry.status.flipped(), 42)).unwrap();
        assert_eq!(refreshed.status, ProbeStatus::Down);

        tokio::time::advance(Duration::from_secs(9)).await;
        let entry = cache.lookup(URL).unwrap();
        assert_eq!(entry.response_time_ms, 42);
    }
}
