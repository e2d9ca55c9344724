//! Broadcast channel for outgoing notifications.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel and implements
//! [`NotificationSink`]. Delivery workers (the server's log drain, or a
//! mailer) subscribe and consume [`Dispatch`] values at their own pace.

use async_trait::async_trait;
use tokio::sync::broadcast;

use super::notification::{Dispatch, EmailMessage, Notification};
use super::ports::{DeliveryError, NotificationSink};

/// Broadcast bus for [`Dispatch`]es.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest entries are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Dispatch>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a dispatch to all subscribers.
    ///
    /// Returns the number of receivers that got it. With no receivers the
    /// dispatch is silently dropped.
    pub fn publish(&self, dispatch: Dispatch) -> usize {
        self.sender.send(dispatch).unwrap_or(0)
    }

    /// Creates a new receiver for all future dispatches.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Dispatch> {
        self.sender.subscribe()
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NotificationSink for EventBus {
    async fn notify(&self, notification: Notification) -> Result<(), DeliveryError> {
        self.publish(Dispatch::Notification(notification));
        Ok(())
    }

    async fn email(&self, email: EmailMessage) -> Result<(), DeliveryError> {
        self.publish(Dispatch::Email(email));
        Ok(())
    }
}
