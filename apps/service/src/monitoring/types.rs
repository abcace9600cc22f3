use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settled outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    pub fn flipped(self) -> Self {
        match self {
            ProbeStatus::Up => ProbeStatus::Down,
            ProbeStatus::Down => ProbeStatus::Up,
        }
    }

    pub fn is_up(self) -> bool {
        self == ProbeStatus::Up
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Up => write!(f, "UP"),
            ProbeStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// Status of a monitored URL as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UrlStatus {
    Up,
    Down,
    /// A probe is in flight, or the URL has never been checked.
    Checking,
}

impl UrlStatus {
    /// The probe status this maps to, if the URL has a settled verdict.
    pub fn settled(self) -> Option<ProbeStatus> {
        match self {
            UrlStatus::Up => Some(ProbeStatus::Up),
            UrlStatus::Down => Some(ProbeStatus::Down),
            UrlStatus::Checking => None,
        }
    }
}

impl From<ProbeStatus> for UrlStatus {
    fn from(status: ProbeStatus) -> Self {
        match status {
            ProbeStatus::Up => UrlStatus::Up,
            ProbeStatus::Down => UrlStatus::Down,
        }
    }
}

impl std::fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlStatus::Up => write!(f, "UP"),
            UrlStatus::Down => write!(f, "DOWN"),
            UrlStatus::Checking => write!(f, "CHECKING"),
        }
    }
}

/// Resolved outcome of one probe, fresh or replayed from the cache.
///
/// Verdicts are values: nothing mutates one after it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeVerdict {
    /// URL that was probed
    pub url: String,

    pub status: ProbeStatus,

    /// Response time in milliseconds
    pub response_time_ms: Option<u64>,

    /// HTTP status code, real or implied by a cache hit
    pub http_status_code: Option<u16>,

    /// When the verdict was produced
    pub timestamp: DateTime<Utc>,

    /// Derived from a live cache entry instead of the network
    pub cached: bool,

    /// Synthesized because the real probe could not complete
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,

    /// Underlying probe failure, kept for diagnostics only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeVerdict {
    /// Verdict from a probe that reached the target.
    pub fn live(url: &str, status: ProbeStatus, response_time_ms: u64, http_status_code: u16) -> Self {
        Self {
            url: url.to_string(),
            status,
            response_time_ms: Some(response_time_ms),
            http_status_code: Some(http_status_code),
            timestamp: Utc::now(),
            cached: false,
            simulated: false,
            error: None,
        }
    }

    /// Verdict replayed from a cache entry.
    pub fn from_cache(url: &str, status: ProbeStatus, response_time_ms: u64) -> Self {
        let http_status_code = match status {
            ProbeStatus::Up => 200,
            ProbeStatus::Down => 500,
        };

        Self {
            url: url.to_string(),
            status,
            response_time_ms: Some(response_time_ms),
            http_status_code: Some(http_status_code),
            timestamp: Utc::now(),
            cached: true,
            simulated: false,
            error: None,
        }
    }

    /// Best-effort verdict standing in for a probe that failed.
    pub fn fallback(url: &str, status: ProbeStatus, response_time_ms: Option<u64>, error: String) -> Self {
        Self {
            url: url.to_string(),
            status,
            response_time_ms,
            http_status_code: None,
            timestamp: Utc::now(),
            cached: false,
            simulated: true,
            error: Some(error),
        }
    }

    /// Genuine DOWN verdict carrying the probe failure.
    pub fn unreachable(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            status: ProbeStatus::Down,
            response_time_ms: None,
            http_status_code: None,
            timestamp: Utc::now(),
            cached: false,
            simulated: false,
            error: Some(error),
        }
    }
}

/// One completed check in a URL's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub status: ProbeStatus,
    pub response_time_ms: Option<u64>,
}

impl From<&ProbeVerdict> for HistoryEntry {
    fn from(verdict: &ProbeVerdict) -> Self {
        Self {
            timestamp: verdict.timestamp,
            status: verdict.status,
            response_time_ms: verdict.response_time_ms,
        }
    }
}
