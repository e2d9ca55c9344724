//! Reviews left by requesters on completed sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ReviewId, SessionId, UserId};
use crate::error::GatewayError;

/// Lowest accepted rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted rating.
pub const MAX_RATING: u8 = 5;

/// Validated review input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSubmission {
    rating: u8,
    comments: Option<String>,
}

impl ReviewSubmission {
    /// Validates the rating range and drops blank comments.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] when `rating` is outside
    /// `1..=5`.
    pub fn new(rating: i64, comments: Option<String>) -> Result<Self, GatewayError> {
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
            .ok_or_else(|| {
                GatewayError::validation(
                    "rating",
                    format!("must be between {MIN_RATING} and {MAX_RATING}"),
                )
            })?;
        let comments = comments.filter(|c| !c.trim().is_empty());
        Ok(Self { rating, comments })
    }

    /// Star rating.
    #[must_use]
    pub const fn rating(&self) -> u8 {
        self.rating
    }

    /// Free-form comments, if any.
    #[must_use]
    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }
}

/// A stored review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Review {
    /// Review identifier.
    pub id: ReviewId,
    /// Reviewed session.
    pub session_id: SessionId,
    /// Requester who wrote the review.
    pub author: UserId,
    /// Provider being reviewed.
    pub subject: UserId,
    /// Star rating, 1 to 5.
    pub rating: u8,
    /// Free-form comments.
    pub comments: Option<String>,
    /// Submission time.
    pub created_on: DateTime<Utc>,
}

impl Review {
    /// Builds the review row for a session.
    #[must_use]
    pub fn for_session(
        session_id: SessionId,
        author: UserId,
        subject: UserId,
        submission: &ReviewSubmission,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            session_id,
            author,
            subject,
            rating: submission.rating(),
            comments: submission.comments().map(str::to_string),
            created_on: Utc::now(),
        }
    }
}

/// Mean rating rounded to one decimal place, `0.0` when there are none.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> f64 {
    if reviews.is_empty() {
        return 0.0;
    }
    let sum: u64 = reviews.iter().map(|r| u64::from(r.rating)).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum as f64 / reviews.len() as f64;
    (mean * 10.0).round() / 10.0
}
