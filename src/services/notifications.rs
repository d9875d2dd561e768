//! New-Match Notifications
//!
//! Fire-and-forget boundary between the matcher and notification delivery.
//! The matcher enqueues a [`NewMatchesEvent`] and moves on; delivery
//! (email, push, live dashboard updates) is owned by whatever subscribes to
//! the hub. Nothing on this path can block or fail a matching call.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One matched property, as shown in a "new matches" notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub score: f64,
    pub property_title: String,
    pub property_city: String,
    pub property_state: String,
}

/// Event emitted after a matching run produced at least one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMatchesEvent {
    pub user_id: Uuid,
    pub matches: Vec<MatchSummary>,
}

/// Best-effort notification dispatch.
///
/// Implementations must not return errors and must not block the caller
/// beyond enqueueing; the matching transaction is already committed by the
/// time this is called.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_new_matches(&self, event: NewMatchesEvent);
}

/// Broadcast-channel hub implementation.
///
/// Subscribers (the WebSocket layer, an email worker) attach via
/// [`NotificationHub::subscribe`]. A send with no live subscribers is
/// expected during startup and quiet periods and is simply dropped.
pub struct NotificationHub {
    tx: broadcast::Sender<NewMatchesEvent>,
}

impl NotificationHub {
    const CHANNEL_CAPACITY: usize = 256;

    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NewMatchesEvent> {
        self.tx.subscribe()
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for NotificationHub {
    async fn notify_new_matches(&self, event: NewMatchesEvent) {
        let user_id = event.user_id;
        let count = event.matches.len();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(%user_id, count, receivers, "new-matches event dispatched");
            }
            Err(_) => {
                // No subscribers; the event is dropped by design.
                tracing::debug!(%user_id, count, "no notification subscribers, event dropped");
            }
        }
    }
}
