use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::monitoring::types::ProbeStatus;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A monitored URL moved between UP and DOWN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub id: Uuid,
    pub url: String,
    pub old_status: ProbeStatus,
    pub new_status: ProbeStatus,
    pub response_time_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Fan-out channel for status changes; external notifiers subscribe here.
#[derive(Debug, Clone)]
pub struct StatusEvents {
    tx: broadcast::Sender<StatusChange>,
}

impl Default for StatusEvents {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl StatusEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.tx.subscribe()
    }

    /// Publish `change`; returns how many subscribers received it.
    pub fn publish(&self, change: StatusChange) -> usize {
        debug!(
            id = %change.id,
            url = %change.url,
            from = %change.old_status,
            to = %change.new_status,
            "Publishing status change"
        );
        // No subscribers is not an error.
        self.tx.send(change).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change() -> StatusChange {
        StatusChange {
            id: Uuid::new_v4(),
            url: "https://example.com/".to_string(),
            old_status: ProbeStatus::Up,
            new_status: ProbeStatus::Down,
            response_time_ms: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_changes() {
        let events = StatusEvents::default();
        let mut rx = events.subscribe();

        let sent = change();
        assert_eq!(events.publish(sent.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), sent);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let events = StatusEvents::new(4);
        assert_eq!(events.publish(change()), 0);
    }

    #[test]
    fn test_change_json_shape() {
        let json = serde_json::to_value(change()).unwrap();
        assert_eq!(json["oldStatus"], "UP");
        assert_eq!(json["newStatus"], "DOWN");
        assert!(json["responseTimeMs"].is_null());
    }
}
