//! Booking session DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    BookingSession, Decision, LineItem, Review, ServiceId, SessionId, SessionStatus, UserId,
};
use crate::error::GatewayError;

/// Request body for `POST /sessions`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeSessionRequest {
    /// Provider the proposal is addressed to.
    pub target_id: UserId,
    /// Calendar date of the session (`YYYY-MM-DD`).
    pub requested_date: NaiveDate,
    /// Requested start time (ISO-8601, must fall on `requested_date`).
    pub start_time: DateTime<Utc>,
    /// Selected catalog offerings.
    pub requested_services: Vec<ServiceId>,
}

/// Provider decision verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionActionKind {
    /// Accept the proposal; requires `duration_hours`.
    Accept,
    /// Reject the proposal.
    Reject,
}

/// Request body for `POST /sessions/{id}/action`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SessionActionRequest {
    /// Accept or reject.
    pub action: SessionActionKind,
    /// Session length in whole hours, required when accepting.
    #[serde(default)]
    pub duration_hours: Option<u32>,
}

impl SessionActionRequest {
    /// Converts the request into a domain [`Decision`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when accepting without a
    /// duration.
    pub fn into_decision(self) -> Result<Decision, GatewayError> {
        match self.action {
            SessionActionKind::Reject => Ok(Decision::Reject),
            SessionActionKind::Accept => {
                let duration_hours = self.duration_hours.ok_or_else(|| {
                    GatewayError::validation("duration_hours", "required when accepting")
                })?;
                Ok(Decision::Accept { duration_hours })
            }
        }
    }
}

/// Request body for `POST /sessions/{id}/payment`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentRequest {
    /// ISO currency code, any case.
    pub currency: String,
}

/// Request body for `POST /sessions/{id}/review`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ReviewRequest {
    /// Star rating, 1 to 5.
    pub rating: i64,
    /// Free-form comments.
    #[serde(default)]
    pub comments: Option<String>,
}

/// A booking session with its derived presentation fields.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Session identifier.
    pub session_id: SessionId,
    /// User who sent the proposal.
    pub requester_id: UserId,
    /// User providing the service.
    pub provider_id: UserId,
    /// Frozen line items.
    pub line_items: Vec<LineItem>,
    /// Calendar date of the session.
    pub requested_date: NaiveDate,
    /// Requested start time.
    pub start_time: DateTime<Utc>,
    /// End time, once accepted.
    pub end_time: Option<DateTime<Utc>>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Total price fixed at proposal time.
    pub total_price: u64,
    /// Whether the requester has reviewed the session.
    pub reviewed: bool,
    /// `true` once the provider accepted or rejected.
    pub is_action_taken: bool,
    /// `not_paid`, `paid` or `completed`; absent before acceptance or
    /// after rejection.
    pub payment: Option<String>,
    /// Proposal time.
    pub created_at: DateTime<Utc>,
}

impl From<BookingSession> for SessionResponse {
    fn from(session: BookingSession) -> Self {
        let is_action_taken = matches!(
            session.status,
            SessionStatus::Accepted | SessionStatus::Rejected
        );
        let payment = match session.status {
            SessionStatus::Accepted => Some("not_paid"),
            SessionStatus::Paid => Some("paid"),
            SessionStatus::Completed => Some("completed"),
            SessionStatus::Proposed | SessionStatus::Rejected => None,
        }
        .map(str::to_string);
        Self {
            session_id: session.id,
            requester_id: session.requester,
            provider_id: session.provider,
            line_items: session.line_items,
            requested_date: session.requested_date,
            start_time: session.start_timestamp,
            end_time: session.end_timestamp,
            status: session.status,
            total_price: session.total_price,
            reviewed: session.reviewed,
            is_action_taken,
            payment,
            created_at: session.created_at,
        }
    }
}

/// Response body for `POST /sessions/{id}/review`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CompletedSessionResponse {
    /// The completed session.
    pub session: SessionResponse,
    /// The stored review.
    pub review: Review,
}
