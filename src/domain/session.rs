//! Booking session aggregate and its lifecycle.
//!
//! A [`BookingSession`] is one negotiation between a requester and a
//! provider. Its [`SessionStatus`] only ever moves forward:
//!
//! ```text
//! proposed ──► accepted ──► paid ──► completed
//!     │
//!     └──────► rejected
//! ```
//!
//! The aggregate exposes one method per edge; each method consults
//! [`SessionStatus::can_transition_to`] and mutates the session only when
//! the edge is legal.
//! Persistence and side effects are the service layer's business.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ServiceId, SessionId, UserId};
use crate::error::GatewayError;

/// Negotiation status of a booking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Sent by the requester, awaiting the provider's decision.
    Proposed,
    /// Accepted by the provider, awaiting payment.
    Accepted,
    /// Declined by the provider. Terminal.
    Rejected,
    /// Payment captured and provider credited.
    Paid,
    /// Reviewed by the requester. Terminal.
    Completed,
}

impl SessionStatus {
    /// Statuses that block a calendar slot.
    pub const OCCUPYING: [Self; 3] = [Self::Accepted, Self::Paid, Self::Completed];

    /// Returns the status as its storage string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Paid => "paid",
            Self::Completed => "completed",
        }
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Proposed, Self::Accepted)
                | (Self::Proposed, Self::Rejected)
                | (Self::Accepted, Self::Paid)
                | (Self::Paid, Self::Completed)
        )
    }

    /// Returns `true` if a session in this status blocks its time slot.
    #[must_use]
    pub const fn is_occupying(self) -> bool {
        matches!(self, Self::Accepted | Self::Paid | Self::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(Self::Proposed),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "paid" => Ok(Self::Paid),
            "completed" => Ok(Self::Completed),
            other => Err(GatewayError::Internal(format!(
                "unknown session status in storage: {other}"
            ))),
        }
    }
}

/// A priced service captured at proposal time.
///
/// Stored by value on the session so that later catalog edits never
/// change what was agreed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    /// Catalog offering the item was copied from.
    pub service_id: ServiceId,
    /// Display name at proposal time.
    pub service_name: String,
    /// Unit cost in whole currency units at proposal time.
    pub unit_cost: u64,
}

/// Provider's answer to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Accept for the given number of hours.
    Accept {
        /// Agreed duration in hours. Must be positive.
        duration_hours: u32,
    },
    /// Decline the proposal.
    Reject,
}

/// One booking negotiation between a requester and a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookingSession {
    /// Session identifier.
    pub id: SessionId,
    /// User who sent the proposal and pays for it.
    pub requester: UserId,
    /// User who provides the service and receives the payment.
    pub provider: UserId,
    /// Frozen line items, in the order they were requested.
    pub line_items: Vec<LineItem>,
    /// Calendar date of the session.
    pub requested_date: NaiveDate,
    /// Requested start time.
    pub start_timestamp: DateTime<Utc>,
    /// End time, known once the provider accepted a duration.
    pub end_timestamp: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: SessionStatus,
    /// Sum of the line items' unit costs. Fixed at proposal time.
    pub total_price: u64,
    /// Whether the requester has reviewed the session.
    pub reviewed: bool,
    /// When the proposal was stored.
    pub created_at: DateTime<Utc>,
}

impl BookingSession {
    /// Builds a new session in [`SessionStatus::Proposed`].
    #[must_use]
    pub fn propose(
        requester: UserId,
        provider: UserId,
        requested_date: NaiveDate,
        start_timestamp: DateTime<Utc>,
        line_items: Vec<LineItem>,
        total_price: u64,
    ) -> Self {
        Self {
            id: SessionId::new(),
            requester,
            provider,
            line_items,
            requested_date,
            start_timestamp,
            end_timestamp: None,
            status: SessionStatus::Proposed,
            total_price,
            reviewed: false,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` if `user` is either party of the session.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.requester == user || self.provider == user
    }

    /// Returns `true` if the session blocks any instant of `[start, end]`.
    ///
    /// Only occupying statuses with a known end time count. Touching
    /// boundaries overlap.
    #[must_use]
    pub fn overlaps(&self, range_start: DateTime<Utc>, range_end: DateTime<Utc>) -> bool {
        if !self.status.is_occupying() {
            return false;
        }
        match self.end_timestamp {
            Some(end) => self.start_timestamp <= range_end && end >= range_start,
            None => false,
        }
    }

    /// Applies the provider's decision.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadyActioned`] if the session is no
    /// longer proposed, or [`GatewayError::Validation`] for a zero
    /// duration. The session is untouched on error.
    pub fn resolve(&mut self, decision: Decision) -> Result<(), GatewayError> {
        let next = match decision {
            Decision::Accept { .. } => SessionStatus::Accepted,
            Decision::Reject => SessionStatus::Rejected,
        };
        if !self.status.can_transition_to(next) {
            return Err(GatewayError::AlreadyActioned(self.id));
        }
        match decision {
            Decision::Accept { duration_hours } => {
                if duration_hours == 0 {
                    return Err(GatewayError::validation(
                        "duration_hours",
                        "must be greater than zero",
                    ));
                }
                let end = self
                    .start_timestamp
                    .checked_add_signed(Duration::hours(i64::from(duration_hours)))
                    .ok_or_else(|| {
                        GatewayError::validation("duration_hours", "end time out of range")
                    })?;
                self.end_timestamp = Some(end);
            }
            Decision::Reject => {}
        }
        self.status = next;
        Ok(())
    }

    /// Checks that the session can be settled right now.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlreadySettled`] once paid (or completed),
    /// and [`GatewayError::IllegalTransition`] from any other non-accepted
    /// status.
    pub fn ensure_settleable(&self) -> Result<(), GatewayError> {
        if self.status.can_transition_to(SessionStatus::Paid) {
            return Ok(());
        }
        match self.status {
            SessionStatus::Paid | SessionStatus::Completed => {
                Err(GatewayError::AlreadySettled(self.id))
            }
            from => Err(GatewayError::IllegalTransition {
                from,
                to: SessionStatus::Paid,
            }),
        }
    }

    /// Moves an accepted session to [`SessionStatus::Paid`].
    ///
    /// # Errors
    ///
    /// See [`BookingSession::ensure_settleable`].
    pub fn mark_paid(&mut self) -> Result<(), GatewayError> {
        self.ensure_settleable()?;
        self.status = SessionStatus::Paid;
        Ok(())
    }

    /// Moves a paid, unreviewed session to [`SessionStatus::Completed`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::IllegalTransition`] unless the session is
    /// paid and not yet reviewed.
    pub fn complete(&mut self) -> Result<(), GatewayError> {
        if self.reviewed || !self.status.can_transition_to(SessionStatus::Completed) {
            return Err(GatewayError::IllegalTransition {
                from: self.status,
                to: SessionStatus::Completed,
            });
        }
        self.status = SessionStatus::Completed;
        self.reviewed = true;
        Ok(())
    }

    /// Amount to capture, in minor currency units.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] on overflow.
    pub fn amount_minor(&self) -> Result<u64, GatewayError> {
        self.total_price
            .checked_mul(100)
            .ok_or_else(|| GatewayError::Internal("session amount overflows".to_string()))
    }

    /// Comma-separated display names of the line items.
    #[must_use]
    pub fn service_names(&self) -> String {
        self.line_items
            .iter()
            .map(|item| item.service_name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}
