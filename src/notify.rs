use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::models::shipment::ShipmentId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientNotification {
    pub shipment_id: ShipmentId,
    pub recipient_email: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Outbound recipient notifications. Callers never let a failure here undo
/// the operation that triggered it.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn notify_recipient(
        &self,
        shipment_id: ShipmentId,
        recipient_email: &str,
    ) -> Result<(), NotifyError>;
}

/// Logs every notification and fans it out to websocket subscribers.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<RecipientNotification>,
}

impl BroadcastNotifier {
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _unused_rx) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecipientNotification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl NotificationPort for BroadcastNotifier {
    async fn notify_recipient(
        &self,
        shipment_id: ShipmentId,
        recipient_email: &str,
    ) -> Result<(), NotifyError> {
        let notification = RecipientNotification {
            shipment_id,
            recipient_email: recipient_email.to_string(),
            sent_at: Utc::now(),
        };

        info!(shipment_id, recipient = %recipient_email, "recipient notified");

        // No subscribers is not a failure.
        if self.tx.send(notification).is_err() {
            debug!(shipment_id, "no notification subscribers");
        }
        Ok(())
    }
}
