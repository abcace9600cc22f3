use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use super::records::{PERSISTED_HISTORY_LIMIT, prepare_for_save, sanitize_records};
use crate::error::{MonitorError, Result};
use crate::registry::MonitoredUrl;

/// Storage for registry snapshots
#[async_trait]
pub trait Database: Send + Sync {
    /// Load every persisted URL, already sanitized. Empty if nothing was saved yet.
    async fn load_urls(&self) -> Result<Vec<MonitoredUrl>>;

    /// Replace the persisted set with `urls`.
    async fn save_urls(&self, urls: &[MonitoredUrl]) -> Result<()>;
}

/// One JSON array in one file.
#[derive(Debug, Clone)]
pub struct JsonFileDatabase {
    path: PathBuf,
    history_limit: usize,
}

impl JsonFileDatabase {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), history_limit: PERSISTED_HISTORY_LIMIT }
    }

    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait]
impl Database for JsonFileDatabase {
    async fn load_urls(&self) -> Result<Vec<MonitoredUrl>> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No snapshot yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let Value::Array(records) = serde_json::from_slice(&raw)? else {
            return Err(MonitorError::Internal(format!(
                "snapshot {} is not a JSON array",
                self.path.display()
            )));
        };

        let total = records.len();
        let urls = sanitize_records(records);
        info!(path = %self.path.display(), loaded = urls.len(), dropped = total - urls.len(), "Snapshot loaded");
        Ok(urls)
    }

    async fn save_urls(&self, urls: &[MonitoredUrl]) -> Result<()> {
        let body = serde_json::to_vec_pretty(&prepare_for_save(urls, self.history_limit))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        // Write then rename so a crash never leaves a half-written snapshot.
        let staging = self.staging_path();
        fs::write(&staging, body).await?;
        fs::rename(&staging, &self.path).await?;

        debug!(path = %self.path.display(), count = urls.len(), "Snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::{HistoryEntry, ProbeStatus};
    use chrono::Utc;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db = JsonFileDatabase::new(dir.path().join("urls.json"));
        assert!(db.load_urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let db = JsonFileDatabase::new(dir.path().join("nested/urls.json")).with_history_limit(3);

        let mut url = MonitoredUrl::new("https://a.com/".to_string());
        for status in [ProbeStatus::Down, ProbeStatus::Down, ProbeStatus::Up, ProbeStatus::Up, ProbeStatus::Up] {
            url.push_history(HistoryEntry { timestamp: Utc::now(), status, response_time_ms: Some(50) }, 1000);
        }
        url.status = ProbeStatus::Up.into();
        url.tags = vec!["api".to_string()];

        db.save_urls(std::slice::from_ref(&url)).await.unwrap();
        assert_eq!(url.uptime, 60.0);

        let loaded = db.load_urls().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, url.id);
        assert_eq!(loaded[0].history.len(), 3);
        assert_eq!(loaded[0].uptime, 100.0);
        assert_eq!(loaded[0].tags, url.tags);
        assert!(!dir.path().join("nested/urls.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_non_array_snapshot_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.json");
        std::fs::write(&path, r#"{"url": "https://a.com"}"#).unwrap();

        let err = JsonFileDatabase::new(&path).load_urls().await.unwrap_err();
        assert!(matches!(err, MonitorError::Internal(_)));

        std::fs::write(&path, "not json").unwrap();
        let err = JsonFileDatabase::new(&path).load_urls().await.unwrap_err();
        assert!(matches!(err, MonitorError::Json(_)));
    }
}
