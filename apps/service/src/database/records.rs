use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::monitoring::types::UrlStatus;
use crate::registry::MonitoredUrl;
use crate::validation::normalize_url;

/// History entries kept per URL on disk.
pub const PERSISTED_HISTORY_LIMIT: usize = 100;

/// Copy `urls` for writing, keeping only the newest `history_limit` entries
/// of each history. The in-memory records are not touched.
pub fn prepare_for_save(urls: &[MonitoredUrl], history_limit: usize) -> Vec<MonitoredUrl> {
    urls.iter()
        .map(|url| {
            let mut saved = url.clone();
            saved.history = url.history.most_recent(history_limit);
            saved
        })
        .collect()
}

/// Turn raw persisted records into registry aggregates.
///
/// - non-array `tags`/`history` become empty
/// - records that fail to decode, or whose URL is invalid, are dropped
/// - later duplicates of an already-seen URL are dropped
/// - `uptime` is recomputed from history
/// - a stored CHECKING becomes the status of the last history entry
pub fn sanitize_records(raw: Vec<Value>) -> Vec<MonitoredUrl> {
    let mut seen_urls = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut urls = Vec::with_capacity(raw.len());

    for mut record in raw {
        if let Some(fields) = record.as_object_mut() {
            for key in ["tags", "history"] {
                if !fields.get(key).is_some_and(Value::is_array) {
                    fields.insert(key.to_string(), Value::Array(Vec::new()));
                }
            }
        }

        let mut url: MonitoredUrl = match serde_json::from_value(record) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Dropping unreadable persisted record");
                continue;
            }
        };

        url.url = match normalize_url(&url.url) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(url = %url.url, error = %e, "Dropping persisted record with invalid URL");
                continue;
            }
        };

        if seen_urls.contains(&url.url) || !seen_ids.insert(url.id) {
            warn!(url = %url.url, "Dropping duplicate persisted record");
            continue;
        }

        if url.status == UrlStatus::Checking {
            if let Some(last) = url.history.last() {
                url.status = last.status.into();
            }
        }

        seen_urls.insert(url.url.clone());
        let history = std::mem::take(&mut url.history);
        url.set_history(history);
        urls.push(url);
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{HistoryEntry, ProbeStatus};
    use chrono::Utc;
    use serde_json::json;

    fn entry(status: ProbeStatus) -> HistoryEntry {
        HistoryEntry { timestamp: Utc::now(), status, response_time_ms: Some(100) }
    }

    #[test]
    fn test_prepare_for_save_truncates_copy_only() {
        let mut url = MonitoredUrl::new("https://a.com/".to_string());
        for i in 0..150 {
            let status = if i < 100 { ProbeStatus::Down } else { ProbeStatus::Up };
            url.push_history(entry(status), 1000);
        }
        let uptime = url.uptime;

        let saved = prepare_for_save(std::slice::from_ref(&url), PERSISTED_HISTORY_LIMIT);
        assert_eq!(saved[0].history.len(), 100);
        assert_eq!(saved[0].history.last().unwrap().status, ProbeStatus::Up);
        assert_eq!(url.history.len(), 150);
        assert_eq!(url.uptime, uptime);
    }

    #[test]
    fn test_sanitize_fills_missing_arrays() {
        let id = uuid::Uuid::new_v4();
        let raw = vec![json!({
            "id": id,
            "url": "https://a.com",
            "status": "UP",
            "tags": "not-an-array",
        })];

        let urls = sanitize_records(raw);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].id, id);
        assert_eq!(urls[0].url, "https://a.com/");
        assert!(urls[0].tags.is_empty());
        assert!(urls[0].history.is_empty());
        assert!(urls[0].is_enabled);
    }

    #[test]
    fn test_sanitize_drops_invalid_and_duplicates() {
        let raw = vec![
            json!({ "id": uuid::Uuid::new_v4(), "url": "https://a.com", "status": "UP" }),
            json!({ "id": uuid::Uuid::new_v4(), "url": "https://a.com/", "status": "DOWN" }),
            json!({ "id": uuid::Uuid::new_v4(), "url": "ftp://b.com", "status": "UP" }),
            json!({ "url": "https://c.com", "status": "UP" }),
            json!("garbage"),
        ];

        let urls = sanitize_records(raw);
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].status, UrlStatus::Up);
    }

    #[test]
    fn test_sanitize_recomputes_uptime_and_settles_checking() {
        let history = vec![entry(ProbeStatus::Up), entry(ProbeStatus::Up), entry(ProbeStatus::Down)];
        let raw = vec![
            json!({
                "id": uuid::Uuid::new_v4(),
                "url": "https://a.com",
                "status": "CHECKING",
                "uptime": 12.5,
                "history": history,
            }),
            json!({ "id": uuid::Uuid::new_v4(), "url": "https://b.com", "status": "CHECKING" }),
        ];

        let urls = sanitize_records(raw);
        assert_eq!(urls[0].status, UrlStatus::Down);
        assert!((urls[0].uptime - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(urls[1].status, UrlStatus::Checking);
        assert_eq!(urls[1].uptime, 0.0);
    }
}
