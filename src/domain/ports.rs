//! Interfaces to the external collaborators of the booking core.

use std::fmt;

use async_trait::async_trait;

use super::notification::{EmailMessage, Notification};
use super::{Currency, SessionId};

/// Failure reported by a notification sink. Never fails a transition.
#[derive(Debug, thiserror::Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Fire-and-forget destination for notifications and e-mails.
#[async_trait]
pub trait NotificationSink: Send + Sync + fmt::Debug {
    /// Queues an in-app notification.
    async fn notify(&self, notification: Notification) -> Result<(), DeliveryError>;

    /// Queues an e-mail.
    async fn email(&self, email: EmailMessage) -> Result<(), DeliveryError>;
}

/// Payment capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Session being paid for. Also the capture's idempotency key.
    pub session_id: SessionId,
    /// Amount in minor units.
    pub amount_minor: u64,
    /// Capture currency.
    pub currency: Currency,
}

/// Answer from the payment processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Whether the processor accepted the capture.
    pub success: bool,
    /// Processor-issued reference (client secret or intent id).
    pub reference: String,
}

/// Transport-level failure talking to the payment processor.
#[derive(Debug, thiserror::Error)]
#[error("payment processor error: {0}")]
pub struct ProcessorError(pub String);

/// Blocking payment capture primitive. No retries happen on this side.
#[async_trait]
pub trait PaymentProcessor: Send + Sync + fmt::Debug {
    /// Captures `request.amount_minor` in `request.currency`.
    ///
    /// Implementations must treat `request.session_id` as an idempotency
    /// key: a repeated capture for a session that was already charged
    /// returns the original outcome instead of charging again.
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureOutcome, ProcessorError>;
}
