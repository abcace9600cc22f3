/// Monitored-URL registry
///
/// The registry is the single owner and writer of every `MonitoredUrl`:
/// - creation, removal, and settings updates
/// - the per-URL in-flight claim that keeps probes for one id sequential
/// - applying verdicts to history, uptime, and status
/// - surfacing UP/DOWN transitions on the status event channel
pub mod events;
pub mod history;
pub mod model;

pub use events::{StatusChange, StatusEvents};
pub use history::{History, HistorySummary, MAX_HISTORY_ENTRIES, TimeRange};
pub use model::{MonitoredUrl, Priority, UrlSettings};

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{MonitorError, Result};
use crate::monitoring::types::{HistoryEntry, ProbeStatus, ProbeVerdict, UrlStatus};
use crate::validation::{normalize_tags, normalize_url, validate_check_interval};
use model::InFlight;

/// Default cap on URLs accepted by one bulk add.
pub const DEFAULT_BULK_LIMIT: usize = 50;

/// Outcome of a bulk add.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAddReport {
    pub added: Vec<MonitoredUrl>,
    /// Entries that failed validation, as given
    pub invalid: Vec<String>,
    /// Entries already monitored
    pub skipped: Vec<String>,
}

/// What applying a verdict did to an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub id: Uuid,
    pub url: String,
    /// Status before the probe that produced this verdict
    pub previous: UrlStatus,
    pub current: ProbeStatus,
    pub response_time_ms: Option<u64>,
    pub notifications_enabled: bool,
    /// Whether a status change was published for this verdict
    pub emitted: bool,
}

impl RecordOutcome {
    /// The UP/DOWN transition this verdict made, if any.
    ///
    /// A first verdict after CHECKING settles the URL without counting as a
    /// change, so no CHECKING to UP/DOWN event is ever published. Only moves
    /// between two settled statuses qualify, which is why
    /// [`StatusChange::old_status`] is a [`ProbeStatus`].
    pub fn transition(&self) -> Option<(ProbeStatus, ProbeStatus)> {
        self.previous
            .settled()
            .filter(|old| *old != self.current)
            .map(|old| (old, self.current))
    }
}

/// Process-wide set of monitored URLs, newest first.
#[derive(Debug)]
pub struct Registry {
    urls: RwLock<Vec<MonitoredUrl>>,
    events: StatusEvents,
    history_limit: usize,
    bulk_limit: usize,
    next_token: AtomicU64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(StatusEvents::default())
    }
}

impl Registry {
    pub fn new(events: StatusEvents) -> Self {
        Self {
            urls: RwLock::new(Vec::new()),
            events,
            history_limit: MAX_HISTORY_ENTRIES,
            bulk_limit: DEFAULT_BULK_LIMIT,
            next_token: AtomicU64::new(1),
        }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit.max(1);
        self
    }

    pub fn with_bulk_limit(mut self, bulk_limit: usize) -> Self {
        self.bulk_limit = bulk_limit;
        self
    }

    pub fn events(&self) -> &StatusEvents {
        &self.events
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<MonitoredUrl>> {
        self.urls.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<MonitoredUrl>> {
        self.urls.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `url` in CHECKING state with an empty history.
    pub fn add(&self, url: &str) -> Result<MonitoredUrl> {
        let normalized = normalize_url(url)?;
        let mut urls = self.write();

        if urls.iter().any(|existing| existing.url == normalized) {
            return Err(MonitorError::DuplicateUrl(normalized));
        }

        let monitored = MonitoredUrl::new(normalized);
        info!(id = %monitored.id, url = %monitored.url, "Monitoring new URL");
        urls.insert(0, monitored.clone());
        Ok(monitored)
    }

    /// Register several URLs at once.
    ///
    /// The count limit is all-or-nothing; after that each candidate is
    /// validated on its own and bad ones do not block the rest.
    pub fn add_bulk(&self, candidates: &[String]) -> Result<BulkAddReport> {
        if candidates.is_empty() {
            return Err(MonitorError::validation("No valid URLs found"));
        }

        if candidates.len() > self.bulk_limit {
            return Err(MonitorError::BulkLimit { count: candidates.len(), max: self.bulk_limit });
        }

        let mut report = BulkAddReport::default();
        let mut urls = self.write();

        for candidate in candidates {
            let normalized = match normalize_url(candidate) {
                Ok(normalized) => normalized,
                Err(_) => {
                    report.invalid.push(candidate.clone());
                    continue;
                }
            };

            let known = urls.iter().chain(report.added.iter()).any(|u| u.url == normalized);
            if known {
                report.skipped.push(candidate.clone());
                continue;
            }

            report.added.push(MonitoredUrl::new(normalized));
        }

        urls.splice(0..0, report.added.iter().cloned());
        info!(
            added = report.added.len(),
            invalid = report.invalid.len(),
            skipped = report.skipped.len(),
            "Bulk add completed"
        );

        Ok(report)
    }

    /// Delete `id`. Unknown ids are a no-op and return `false`.
    ///
    /// Any probe still in flight for `id` loses its claim with the aggregate,
    /// so its late result is discarded.
    pub fn remove(&self, id: Uuid) -> bool {
        let mut urls = self.write();
        let before = urls.len();
        urls.retain(|url| url.id != id);
        let removed = urls.len() != before;

        if removed {
            info!(id = %id, "Stopped monitoring URL");
        }

        removed
    }

    pub fn get(&self, id: Uuid) -> Option<MonitoredUrl> {
        self.read().iter().find(|url| url.id == id).cloned()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.read().iter().any(|url| url.id == id)
    }

    /// Snapshot of every aggregate, newest first.
    pub fn list(&self) -> Vec<MonitoredUrl> {
        self.read().clone()
    }

    /// Snapshot of the aggregates taking part in scheduled checks.
    pub fn enabled(&self) -> Vec<MonitoredUrl> {
        self.read().iter().filter(|url| url.is_enabled).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn set_enabled(&self, id: Uuid, enabled: bool) -> bool {
        let mut urls = self.write();
        match urls.iter_mut().find(|url| url.id == id) {
            Some(url) => {
                url.is_enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Apply a partial settings update. Returns `Ok(None)` for unknown ids.
    pub fn update_settings(&self, id: Uuid, settings: UrlSettings) -> Result<Option<MonitoredUrl>> {
        if let Some(interval) = settings.check_interval_ms {
            validate_check_interval(interval).to_result()?;
        }
        let tags = settings.tags.as_deref().map(normalize_tags).transpose()?;

        let mut urls = self.write();
        let Some(url) = urls.iter_mut().find(|url| url.id == id) else {
            return Ok(None);
        };

        if let Some(enabled) = settings.is_enabled {
            url.is_enabled = enabled;
        }
        if let Some(interval) = settings.check_interval_ms {
            url.check_interval_ms = interval;
        }
        if let Some(priority) = settings.priority {
            url.priority = priority;
        }
        if let Some(tags) = tags {
            url.tags = tags;
        }
        if let Some(notifications) = settings.notifications_enabled {
            url.notifications_enabled = notifications;
        }

        Ok(Some(url.clone()))
    }

    /// Claim the right to probe `id`.
    ///
    /// Returns `None` if the id is unknown or a probe is already in flight.
    /// While claimed the aggregate reads as CHECKING. Dropping the claim
    /// without completing it puts the previous status back.
    pub fn begin_probe(self: &Arc<Self>, id: Uuid) -> Option<ProbeClaim> {
        let mut urls = self.write();
        let url = urls.iter_mut().find(|url| url.id == id)?;

        if url.in_flight.is_some() {
            debug!(id = %id, "Probe already in flight, skipping");
            return None;
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = url.status;
        url.in_flight = Some(InFlight { token, previous });
        url.status = UrlStatus::Checking;

        Some(ProbeClaim {
            registry: Arc::clone(self),
            id,
            url: url.url.clone(),
            token,
            previous,
            settled: false,
        })
    }

    /// Apply `verdict` to `id`, whoever produced it.
    ///
    /// No-op returning `None` when `id` no longer exists. Clears any
    /// outstanding claim, so that claim's own result will be dropped.
    pub fn record_result(&self, id: Uuid, verdict: &ProbeVerdict) -> Option<RecordOutcome> {
        let mut urls = self.write();
        let url = urls.iter_mut().find(|url| url.id == id)?;
        let previous = url.in_flight.map_or(url.status, |in_flight| in_flight.previous);
        Some(self.apply(url, previous, verdict))
    }

    fn complete_probe(&self, claim: &ProbeClaim, verdict: &ProbeVerdict) -> Option<RecordOutcome> {
        let mut urls = self.write();
        let Some(url) = urls
            .iter_mut()
            .find(|url| url.id == claim.id && url.in_flight.is_some_and(|f| f.token == claim.token))
        else {
            debug!(id = %claim.id, "Discarding result for a probe that lost its claim");
            return None;
        };

        Some(self.apply(url, claim.previous, verdict))
    }

    fn apply(&self, url: &mut MonitoredUrl, previous: UrlStatus, verdict: &ProbeVerdict) -> RecordOutcome {
        url.push_history(HistoryEntry::from(verdict), self.history_limit);
        url.status = verdict.status.into();
        url.response_time_ms = verdict.response_time_ms;
        url.last_checked = Some(verdict.timestamp);
        url.in_flight = None;

        let mut outcome = RecordOutcome {
            id: url.id,
            url: url.url.clone(),
            previous,
            current: verdict.status,
            response_time_ms: verdict.response_time_ms,
            notifications_enabled: url.notifications_enabled,
            emitted: false,
        };

        if let Some((old, new)) = outcome.transition() {
            outcome.emitted = self.publish_change(url, old, new, verdict.response_time_ms);
        }

        outcome
    }

    fn publish_change(
        &self,
        url: &mut MonitoredUrl,
        old: ProbeStatus,
        new: ProbeStatus,
        response_time_ms: Option<u64>,
    ) -> bool {
        if !url.notifications_enabled {
            return false;
        }

        let now = Utc::now();
        url.last_notification = Some(now);
        self.events.publish(StatusChange {
            id: url.id,
            url: url.url.clone(),
            old_status: old,
            new_status: new,
            response_time_ms,
            timestamp: now,
        });
        true
    }

    /// Publish a transition detected outside the registry's own view.
    ///
    /// Returns `false` if the URL is gone or has notifications turned off.
    pub(crate) fn surface_change(
        &self,
        id: Uuid,
        old: ProbeStatus,
        new: ProbeStatus,
        response_time_ms: Option<u64>,
    ) -> bool {
        let mut urls = self.write();
        match urls.iter_mut().find(|url| url.id == id) {
            Some(url) => self.publish_change(url, old, new, response_time_ms),
            None => false,
        }
    }

    fn release(&self, id: Uuid, token: u64) {
        let mut urls = self.write();
        if let Some(url) = urls
            .iter_mut()
            .find(|url| url.id == id && url.in_flight.is_some_and(|f| f.token == token))
        {
            if let Some(in_flight) = url.in_flight.take() {
                url.status = in_flight.previous;
            }
            debug!(id = %id, "Released abandoned probe claim");
        }
    }

    /// Swap the whole registry for `urls` (snapshot restore).
    ///
    /// Outstanding claims are invalidated; uptime is recomputed from each
    /// record's history.
    pub fn replace_all(&self, urls: Vec<MonitoredUrl>) {
        let restored: Vec<MonitoredUrl> = urls
            .into_iter()
            .map(|mut url| {
                url.in_flight = None;
                let mut history = std::mem::take(&mut url.history);
                history.truncate_to(self.history_limit);
                url.set_history(history);
                url
            })
            .collect();

        info!(count = restored.len(), "Registry replaced");
        *self.write() = restored;
    }
}

/// Exclusive right to probe one URL; see [`Registry::begin_probe`].
#[derive(Debug)]
pub struct ProbeClaim {
    registry: Arc<Registry>,
    id: Uuid,
    url: String,
    token: u64,
    previous: UrlStatus,
    settled: bool,
}

impl ProbeClaim {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Apply `verdict` and release the claim.
    ///
    /// Returns `None` when the URL was removed (or its claim revoked) while
    /// the probe ran; the verdict is then discarded.
    pub fn complete(mut self, verdict: &ProbeVerdict) -> Option<RecordOutcome> {
        self.settled = true;
        self.registry.complete_probe(&self, verdict)
    }
}

impl Drop for ProbeClaim {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.release(self.id, self.token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(url: &str, status: ProbeStatus, response_time_ms: Option<u64>) -> ProbeVerdict {
        match response_time_ms {
            Some(ms) => ProbeVerdict::live(url, status, ms, if status.is_up() { 200 } else { 503 }),
            None => ProbeVerdict::unreachable(url, "connection refused".to_string()),
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::default())
    }

    #[test]
    fn test_add_starts_checking() {
        let registry = registry();
        let url = registry.add("https://example.com").unwrap();

        assert_eq!(url.status, UrlStatus::Checking);
        assert!(url.history.is_empty());
        assert_eq!(url.uptime, 0.0);
        assert_eq!(url.url, "https://example.com/");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_url_rejected() {
        let registry = registry();
        registry.add("https://a.com").unwrap();

        let err = registry.add("https://a.com").unwrap_err();
        assert!(matches!(err, MonitorError::DuplicateUrl(_)));
        assert!(matches!(registry.add("https://a.com/"), Err(MonitorError::DuplicateUrl(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_url_rejected_without_mutation() {
        let registry = registry();
        assert!(matches!(registry.add("ftp://a.com"), Err(MonitorError::Validation(_))));
        assert!(matches!(registry.add("not a url"), Err(MonitorError::Validation(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = registry();
        let url = registry.add("https://a.com").unwrap();

        assert!(registry.remove(url.id));
        assert!(!registry.remove(url.id));
        assert!(!registry.remove(Uuid::new_v4()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_bulk_add_validates_each_entry() {
        let registry = registry();
        registry.add("https://existing.com").unwrap();

        let candidates: Vec<String> = [
            "https://a.com",
            "ftp://bad.com",
            "https://existing.com",
            "https://a.com/",
            "nonsense",
            "http://b.com",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let report = registry.add_bulk(&candidates).unwrap();
        assert_eq!(report.added.len(), 2);
        assert_eq!(report.invalid, vec!["ftp://bad.com".to_string(), "nonsense".to_string()]);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(registry.len(), 3);

        let listed: Vec<String> = registry.list().into_iter().map(|u| u.url).collect();
        assert_eq!(listed, vec!["https://a.com/", "http://b.com/", "https://existing.com/"]);
    }

    #[test]
    fn test_bulk_add_over_limit_has_no_effect() {
        let registry = registry();
        let candidates: Vec<String> = (0..51).map(|i| format!("https://host{i}.com")).collect();

        let err = registry.add_bulk(&candidates).unwrap_err();
        assert!(matches!(err, MonitorError::BulkLimit { count: 51, max: 50 }));
        assert!(registry.is_empty());

        assert!(registry.add_bulk(&candidates[..50]).is_ok());
        assert_eq!(registry.len(), 50);
    }

    #[test]
    fn test_bulk_add_rejects_empty_input() {
        let registry = registry();
        assert!(matches!(registry.add_bulk(&[]), Err(MonitorError::Validation(_))));
    }

    #[test]
    fn test_record_result_updates_history_and_uptime() {
        let registry = registry();
        let url = registry.add("https://a.com").unwrap();

        registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Up, Some(100))).unwrap();
        registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Down, None)).unwrap();
        registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Up, Some(80))).unwrap();
        registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Up, Some(90))).unwrap();

        let url = registry.get(url.id).unwrap();
        assert_eq!(url.history.len(), 4);
        assert_eq!(url.uptime, 75.0);
        assert_eq!(url.status, UrlStatus::Up);
        assert_eq!(url.response_time_ms, Some(90));
        assert!(url.last_checked.is_some());
    }

    #[test]
    fn test_history_capped_at_limit() {
        let registry = Arc::new(Registry::default().with_history_limit(10));
        let url = registry.add("https://a.com").unwrap();

        for i in 0..15u64 {
            let status = if i < 12 { ProbeStatus::Down } else { ProbeStatus::Up };
            registry.record_result(url.id, &verdict(&url.url, status, Some(i))).unwrap();
        }

        let url = registry.get(url.id).unwrap();
        assert_eq!(url.history.len(), 10);
        assert_eq!(url.history.iter().next().unwrap().response_time_ms, Some(5));
        assert_eq!(url.uptime, 30.0);
    }

    #[test]
    fn test_record_result_for_unknown_id_is_noop() {
        let registry = registry();
        let outcome = registry.record_result(Uuid::new_v4(), &verdict("https://a.com/", ProbeStatus::Up, Some(1)));
        assert!(outcome.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_claim_blocks_second_probe() {
        let registry = registry();
        let url = registry.add("https://a.com").unwrap();

        let claim = registry.begin_probe(url.id).unwrap();
        assert!(registry.begin_probe(url.id).is_none());
        assert!(registry.get(url.id).unwrap().is_checking());

        claim.complete(&verdict(&url.url, ProbeStatus::Up, Some(10))).unwrap();
        assert!(!registry.get(url.id).unwrap().is_checking());
        assert!(registry.begin_probe(url.id).is_some());
    }

    #[test]
    fn test_dropped_claim_restores_status() {
        let registry = registry();
        let url = registry.add("https://a.com").unwrap();
        registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Up, Some(10)));

        let claim = registry.begin_probe(url.id).unwrap();
        assert_eq!(registry.get(url.id).unwrap().status, UrlStatus::Checking);
        drop(claim);

        let url = registry.get(url.id).unwrap();
        assert_eq!(url.status, UrlStatus::Up);
        assert!(!url.is_checking());
        assert_eq!(url.history.len(), 1);
    }

    #[test]
    fn test_late_result_after_removal_is_discarded() {
        let registry = registry();
        let url = registry.add("https://a.com").unwrap();

        let claim = registry.begin_probe(url.id).unwrap();
        assert!(registry.remove(url.id));

        let outcome = claim.complete(&verdict(&url.url, ProbeStatus::Up, Some(10)));
        assert!(outcome.is_none());
        assert!(registry.get(url.id).is_none());
        assert!(registry.is_empty());

        // Re-adding the same URL gives a new id that the stale claim never touches.
        let again = registry.add("https://a.com").unwrap();
        assert_ne!(again.id, url.id);
        assert!(registry.get(again.id).unwrap().history.is_empty());
    }

    #[tokio::test]
    async fn test_transition_emits_one_event() {
        let registry = registry();
        let mut rx = registry.events().subscribe();
        let url = registry.add("https://a.com").unwrap();

        // CHECKING -> UP is a first verdict, not a transition.
        let first = registry.begin_probe(url.id).unwrap().complete(&verdict(&url.url, ProbeStatus::Up, Some(10)));
        assert!(!first.unwrap().emitted);

        let second = registry.begin_probe(url.id).unwrap().complete(&verdict(&url.url, ProbeStatus::Down, None));
        let second = second.unwrap();
        assert!(second.emitted);
        assert_eq!(second.transition(), Some((ProbeStatus::Up, ProbeStatus::Down)));

        let third = registry.begin_probe(url.id).unwrap().complete(&verdict(&url.url, ProbeStatus::Down, None));
        assert!(!third.unwrap().emitted);

        let change = rx.recv().await.unwrap();
        assert_eq!(change.id, url.id);
        assert_eq!(change.old_status, ProbeStatus::Up);
        assert_eq!(change.new_status, ProbeStatus::Down);
        assert!(rx.try_recv().is_err());
        assert!(registry.get(url.id).unwrap().last_notification.is_some());
    }

    #[test]
    fn test_transition_silent_when_notifications_disabled() {
        let registry = registry();
        let mut rx = registry.events().subscribe();
        let url = registry.add("https://a.com").unwrap();
        registry
            .update_settings(url.id, UrlSettings { notifications_enabled: Some(false), ..Default::default() })
            .unwrap();

        registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Up, Some(10)));
        let outcome = registry.record_result(url.id, &verdict(&url.url, ProbeStatus::Down, None)).unwrap();

        assert!(outcome.transition().is_some());
        assert!(!outcome.emitted);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_settings() {
        let registry = registry();
        let url = registry.add("https://a.com").unwrap();

        let updated = registry
            .update_settings(
                url.id,
                UrlSettings {
                    check_interval_ms: Some(300_000),
                    priority: Some(Priority::High),
                    tags: Some(vec!["api".to_string(), " api ".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.check_interval_ms, 300_000);
        assert_eq!(updated.priority, Priority::High);
        assert_eq!(updated.tags, vec!["api".to_string()]);
        assert!(updated.history.is_empty());

        let bad = UrlSettings { check_interval_ms: Some(5), ..Default::default() };
        assert!(registry.update_settings(url.id, bad).is_err());
        assert!(registry.update_settings(Uuid::new_v4(), UrlSettings::default()).unwrap().is_none());

        assert!(registry.set_enabled(url.id, false));
        assert!(registry.enabled().is_empty());
        assert!(!registry.set_enabled(Uuid::new_v4(), true));
    }

    #[test]
    fn test_replace_all_recomputes_uptime() {
        let registry = registry();
        let mut url = MonitoredUrl::new("https://a.com/".to_string());
        url.history = vec![
            HistoryEntry::from(&verdict("https://a.com/", ProbeStatus::Up, Some(1))),
            HistoryEntry::from(&verdict("https://a.com/", ProbeStatus::Down, None)),
        ]
        .into_iter()
        .collect();
        url.uptime = 99.0;

        registry.replace_all(vec![url.clone()]);
        assert_eq!(registry.get(url.id).unwrap().uptime, 50.0);
    }
}
