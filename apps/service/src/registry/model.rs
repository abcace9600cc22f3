use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::history::History;
use crate::monitoring::types::{HistoryEntry, UrlStatus};

/// Default advisory per-URL check interval (one minute).
pub const DEFAULT_CHECK_INTERVAL_MS: u64 = 60_000;

/// How much a URL matters to whoever is watching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Probe currently claimed for a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlight {
    pub token: u64,
    /// Status held before the claim switched it to CHECKING.
    pub previous: UrlStatus,
}

/// A user-registered target with its history and derived uptime.
///
/// Callers only ever see copies; the registry owns the live aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredUrl {
    pub id: Uuid,

    /// Normalized absolute URL, unique across the registry
    pub url: String,

    pub status: UrlStatus,

    pub response_time_ms: Option<u64>,

    /// Completion time of the latest probe
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,

    #[serde(default)]
    pub history: History,

    /// Always `history.uptime()`
    #[serde(default)]
    pub uptime: f64,

    #[serde(default = "default_true")]
    pub is_enabled: bool,

    /// Advisory interval in milliseconds
    #[serde(default = "default_check_interval", rename = "checkInterval")]
    pub check_interval_ms: u64,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_true")]
    pub notifications_enabled: bool,

    #[serde(default)]
    pub last_notification: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub(crate) in_flight: Option<InFlight>,
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_MS
}

impl MonitoredUrl {
    /// Fresh, never-checked aggregate for an already-normalized URL.
    pub fn new(url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            url,
            status: UrlStatus::Checking,
            response_time_ms: None,
            last_checked: None,
            history: History::new(),
            uptime: 0.0,
            is_enabled: true,
            check_interval_ms: DEFAULT_CHECK_INTERVAL_MS,
            priority: Priority::default(),
            tags: Vec::new(),
            notifications_enabled: true,
            last_notification: None,
            in_flight: None,
        }
    }

    pub fn is_checking(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Append a history entry and keep the derived uptime in step.
    pub(crate) fn push_history(&mut self, entry: HistoryEntry, limit: usize) {
        self.history.push_bounded(entry, limit);
        self.uptime = self.history.uptime();
    }

    /// Replace the history wholesale, recomputing uptime.
    pub(crate) fn set_history(&mut self, history: History) {
        self.history = history;
        self.uptime = self.history.uptime();
    }
}

/// Partial update of a URL's monitoring settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlSettings {
    pub is_enabled: Option<bool>,
    #[serde(rename = "checkInterval")]
    pub check_interval_ms: Option<u64>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub notifications_enabled: Option<bool>,
}
