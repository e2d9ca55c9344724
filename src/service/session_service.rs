//! Session service: the booking negotiation state machine.
//!
//! Every mutating method follows the same pattern: begin a unit of work →
//! lock the session row → apply the transition on the aggregate → write →
//! commit → notify. Notifications go out only after the commit and their
//! failures are logged, never returned.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;

use super::format::{format_session_date, format_time};
use super::pricing::PricingResolver;
use crate::domain::review::average_rating;
use crate::domain::{
    ActionType, BookingSession, Decision, EmailMessage, EmailTemplate, Notification,
    NotificationSink, Review, ReviewSubmission, ServiceId, SessionId, UserId, UserProfile,
};
use crate::error::GatewayError;
use crate::persistence::{BookingStore, CatalogSource};

/// Input of [`SessionService::propose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRequest {
    /// User sending the proposal.
    pub requester: UserId,
    /// User the proposal is addressed to.
    pub provider: UserId,
    /// Calendar date of the session.
    pub requested_date: NaiveDate,
    /// Requested start time; must fall on `requested_date` (UTC).
    pub start_timestamp: DateTime<Utc>,
    /// Selected catalog offerings, in display order.
    pub service_ids: Vec<ServiceId>,
}

/// Sessions occupying a date range, with the distinct dates they fall on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarView {
    /// Distinct requested dates, ascending.
    pub dates: Vec<NaiveDate>,
    /// Overlapping sessions ordered by requested date.
    pub sessions: Vec<BookingSession>,
}

/// Reviews about a user with their aggregate rating.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    /// Number of reviews.
    pub count: usize,
    /// Mean rating rounded to one decimal, `0.0` without reviews.
    pub average_rating: f64,
    /// Reviews, newest first.
    pub reviews: Vec<Review>,
}

/// Orchestrates proposal, decision, review and calendar queries.
#[derive(Debug, Clone)]
pub struct SessionService {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogSource>,
    pricing: PricingResolver,
    notifier: Arc<dyn NotificationSink>,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn CatalogSource>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            store,
            pricing: PricingResolver::new(Arc::clone(&catalog)),
            catalog,
            notifier,
        }
    }

    /// Creates a proposed session from a priced, validated selection.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for bad input (past date, empty
    /// selection, self-booking), [`GatewayError::ProviderUnavailable`] on
    /// the provider's off-day, and pricing or persistence failures.
    pub async fn propose(&self, request: ProposalRequest) -> Result<BookingSession, GatewayError> {
        if request.requester == request.provider {
            return Err(GatewayError::validation(
                "target_id",
                "cannot book a session with yourself",
            ));
        }
        if request.requested_date < Utc::now().date_naive() {
            return Err(GatewayError::validation(
                "requested_date",
                "date is in the past",
            ));
        }
        if request.start_timestamp.date_naive() != request.requested_date {
            return Err(GatewayError::validation(
                "start_timestamp",
                "must fall on the requested date",
            ));
        }

        let (provider, quote) = self
            .pricing
            .price_and_validate(
                request.provider,
                request.requested_date,
                &request.service_ids,
            )
            .await?;
        let requester = self.profile(request.requester).await?;

        let session = BookingSession::propose(
            request.requester,
            request.provider,
            request.requested_date,
            request.start_timestamp,
            quote.line_items,
            quote.total_price,
        );

        let mut uow = self.store.begin().await?;
        uow.insert_session(&session).await?;
        uow.commit().await?;

        tracing::info!(
            session_id = %session.id,
            requester = %session.requester,
            provider = %session.provider,
            total_price = session.total_price,
            "session proposed"
        );

        let date = format_session_date(session.requested_date);
        let start = format_time(session.start_timestamp);
        self.dispatch(
            Notification::about(
                provider.id,
                session.id,
                format!("New Session Request by {}", requester.full_name),
                format!("On {date} at {start}"),
            )
            .actionable(ActionType::SessionRequest),
            Some(EmailMessage::new(
                provider.email.as_str(),
                EmailTemplate::SessionRequest,
                json!({
                    "session_date": date,
                    "start_time": start,
                    "source_name": requester.full_name,
                    "target_name": provider.full_name,
                    "services": session.service_names(),
                }),
            )),
        )
        .await;

        Ok(session)
    }

    /// Applies the provider's decision to a proposed session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`], [`GatewayError::Forbidden`]
    /// when `actor` is not the provider, [`GatewayError::AlreadyActioned`]
    /// when the session is no longer proposed (no side effects fire), and
    /// [`GatewayError::Validation`] for a zero duration.
    pub async fn resolve(
        &self,
        session_id: SessionId,
        actor: UserId,
        decision: Decision,
    ) -> Result<BookingSession, GatewayError> {
        let mut uow = self.store.begin().await?;
        let mut session = uow
            .lock_session(session_id)
            .await?
            .ok_or(GatewayError::SessionNotFound(session_id))?;
        if session.provider != actor {
            return Err(GatewayError::Forbidden(
                "only the provider can act on this proposal".to_string(),
            ));
        }
        session.resolve(decision)?;
        uow.update_session(&session).await?;
        uow.commit().await?;

        tracing::info!(%session_id, status = %session.status, "session resolved");

        let requester = self.catalog.user(session.requester).await.ok().flatten();
        let provider = self.catalog.user(session.provider).await.ok().flatten();
        let provider_name = display_name(provider.as_ref());

        match decision {
            Decision::Accept { .. } => {
                let end = session.end_timestamp.map(format_time).unwrap_or_default();
                let notification = Notification::about(
                    session.requester,
                    session.id,
                    "Booking Session Request Accepted",
                    format!(
                        "Congrats {provider_name} has accepted your session request. \
                         Amount to be paid for this session is ${}",
                        session.total_price
                    ),
                )
                .actionable(ActionType::Payment);
                let email = requester.as_ref().map(|r| {
                    EmailMessage::new(
                        r.email.as_str(),
                        EmailTemplate::SessionAccepted,
                        json!({
                            "source_name": r.full_name,
                            "target_name": provider_name,
                            "custom_date": format_session_date(session.requested_date),
                            "start_time": format_time(session.start_timestamp),
                            "end_time": end,
                            "price": session.total_price,
                        }),
                    )
                });
                self.dispatch(notification, email).await;
            }
            Decision::Reject => {
                let notification = Notification::about(
                    session.requester,
                    session.id,
                    "Booking Session rejected",
                    format!(
                        "Sorry {provider_name} cannot fulfil your session request at this time"
                    ),
                );
                let email = requester.as_ref().map(|r| {
                    EmailMessage::new(
                        r.email.as_str(),
                        EmailTemplate::SessionRejected,
                        json!({
                            "source_name": r.full_name,
                            "target_name": provider_name,
                        }),
                    )
                });
                self.dispatch(notification, email).await;
            }
        }

        Ok(session)
    }

    /// Records the requester's review and completes a paid session.
    ///
    /// The review insert and the status change commit together.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`], [`GatewayError::Forbidden`]
    /// when `actor` is not the requester, and
    /// [`GatewayError::IllegalTransition`] unless the session is paid and
    /// not yet reviewed.
    pub async fn complete(
        &self,
        session_id: SessionId,
        actor: UserId,
        submission: ReviewSubmission,
    ) -> Result<(BookingSession, Review), GatewayError> {
        let mut uow = self.store.begin().await?;
        let mut session = uow
            .lock_session(session_id)
            .await?
            .ok_or(GatewayError::SessionNotFound(session_id))?;
        if session.requester != actor {
            return Err(GatewayError::Forbidden(
                "only the requester can review this session".to_string(),
            ));
        }
        session.complete()?;
        let review = Review::for_session(session.id, session.requester, session.provider, &submission);
        uow.insert_review(&review).await?;
        uow.update_session(&session).await?;
        uow.commit().await?;

        tracing::info!(%session_id, rating = review.rating, "session completed");

        let requester = self.catalog.user(session.requester).await.ok().flatten();
        let provider = self.catalog.user(session.provider).await.ok().flatten();
        let requester_name = display_name(requester.as_ref());
        let services = session.service_names();
        let notification = Notification::about(
            session.provider,
            session.id,
            format!("New Review by {requester_name}"),
            format!("Review for {services} Session. Please click here to check."),
        )
        .actionable(ActionType::Review)
        .with_review(review.id);
        let email = provider.as_ref().map(|p| {
            EmailMessage::new(
                p.email.as_str(),
                EmailTemplate::Review,
                json!({
                    "source_name": requester_name,
                    "target_name": p.full_name,
                    "services": services,
                }),
            )
        });
        self.dispatch(notification, email).await;

        Ok((session, review))
    }

    /// Loads a session.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SessionNotFound`] if it does not exist.
    pub async fn get_session(&self, session_id: SessionId) -> Result<BookingSession, GatewayError> {
        self.store
            .session(session_id)
            .await?
            .ok_or(GatewayError::SessionNotFound(session_id))
    }

    /// Sessions of `user` in an occupying status that intersect
    /// `[range_start, range_end]`, ordered by requested date.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for an inverted range and
    /// persistence failures.
    pub async fn find_overlapping(
        &self,
        user: UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BookingSession>, GatewayError> {
        if range_start > range_end {
            return Err(GatewayError::validation(
                "start_time",
                "range start is after range end",
            ));
        }
        self.store
            .find_overlapping(user, range_start, range_end)
            .await
    }

    /// Calendar for whole days `[start_date 00:00:00, end_date 23:59:59]`.
    ///
    /// # Errors
    ///
    /// See [`SessionService::find_overlapping`].
    pub async fn calendar(
        &self,
        user: UserId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<CalendarView, GatewayError> {
        let range_start = start_date.and_time(chrono::NaiveTime::MIN).and_utc();
        let range_end = end_date
            .and_hms_opt(23, 59, 59)
            .ok_or_else(|| GatewayError::validation("end_time", "date out of range"))?
            .and_utc();
        let sessions = self.find_overlapping(user, range_start, range_end).await?;
        let mut dates: Vec<NaiveDate> = sessions.iter().map(|s| s.requested_date).collect();
        dates.dedup();
        Ok(CalendarView { dates, sessions })
    }

    /// Reviews about `user`.
    ///
    /// # Errors
    ///
    /// Returns persistence failures.
    pub async fn reviews_for(&self, user: UserId) -> Result<ReviewSummary, GatewayError> {
        let reviews = self.store.reviews_for(user).await?;
        Ok(ReviewSummary {
            count: reviews.len(),
            average_rating: average_rating(&reviews),
            reviews,
        })
    }

    async fn profile(&self, id: UserId) -> Result<UserProfile, GatewayError> {
        self.catalog
            .user(id)
            .await?
            .ok_or(GatewayError::UserNotFound(*id.as_uuid()))
    }

    async fn dispatch(&self, notification: Notification, email: Option<EmailMessage>) {
        deliver(self.notifier.as_ref(), notification, email).await;
    }
}

/// Hands a notification and optional e-mail to the sink, logging failures.
pub(crate) async fn deliver(
    sink: &dyn NotificationSink,
    notification: Notification,
    email: Option<EmailMessage>,
) {
    let recipient = notification.recipient;
    if let Err(e) = sink.notify(notification).await {
        tracing::warn!(%recipient, error = %e, "notification dropped");
    }
    if let Some(email) = email {
        let template = email.template.template_name();
        if let Err(e) = sink.email(email).await {
            tracing::warn!(%recipient, template, error = %e, "email dropped");
        }
    }
}

fn display_name(profile: Option<&UserProfile>) -> String {
    profile.map_or_else(|| "A user".to_string(), |p| p.full_name.clone())
}
