//! Settlement outcome notifications.
//!
//! Delivery is fire-and-forget: a notifier never blocks the settlement that
//! produced the notification and never reports failure back to it.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use fxwallet_common::{TransactionId, UserId};
use fxwallet_ledger::TransactionStatus;

/// Payload delivered to a user when a settlement reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub message: String,
    pub details: String,
}

/// Sink for settlement notifications.
pub trait Notifier: Send + Sync {
    fn notify(&self, user_id: &UserId, notification: Notification);
}

/// Shared notifier handle.
pub type SharedNotifier = Arc<dyn Notifier>;

/// Writes each notification to the log as JSON.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user_id: &UserId, notification: Notification) {
        match serde_json::to_string(&notification) {
            Ok(payload) => info!(user_id = %user_id, payload = %payload, "Notification"),
            Err(e) => warn!(user_id = %user_id, error = %e, "Could not encode notification"),
        }
    }
}

/// Per-user bounded channels.
///
/// Notifications for users without a live subscription, or whose channel is
/// full, are dropped.
pub struct ChannelNotifier {
    capacity: usize,
    subscribers: DashMap<UserId, mpsc::Sender<Notification>>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: DashMap::new(),
        }
    }

    /// Open a stream of notifications for `user_id`, replacing any earlier one.
    pub fn subscribe(&self, user_id: &UserId) -> mpsc::Receiver<Notification> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.insert(user_id.clone(), tx);
        debug!(user_id = %user_id, subscribers = self.subscriber_count(), "Notification subscriber registered");
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, user_id: &UserId, notification: Notification) {
        let Some(sender) = self.subscribers.get(user_id).map(|s| s.clone()) else {
            debug!(user_id = %user_id, "No subscriber, notification dropped");
            return;
        };

        match sender.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    user_id = %user_id,
                    transaction_id = %dropped.transaction_id,
                    "Subscriber channel full, notification dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                warn!(
                    user_id = %user_id,
                    transaction_id = %dropped.transaction_id,
                    "Subscriber gone, notification dropped"
                );
                self.subscribers.remove_if(user_id, |_, s| s.is_closed());
            }
        }
    }
}
