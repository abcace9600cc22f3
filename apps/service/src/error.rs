use thiserror::Error;

/// Errors surfaced by the monitoring core to its callers.
///
/// Probe failures never show up here; they are downgraded to verdicts.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("URL already exists: {0}")]
    DuplicateUrl(String),

    #[error("Maximum {max} URLs can be added at once (got {count})")]
    BulkLimit { count: usize, max: usize },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        MonitorError::Validation(msg.into())
    }

    /// Whether the caller sent something unacceptable, as opposed to the
    /// service failing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            MonitorError::Validation(_) | MonitorError::DuplicateUrl(_) | MonitorError::BulkLimit { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
