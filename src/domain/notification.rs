//! Notifications and e-mails emitted on session transitions.
//!
//! The service layer builds these values after a transition commits and
//! hands them to a [`super::ports::NotificationSink`]. Delivery itself is
//! somebody else's job.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ReviewId, SessionId, UserId};

/// What the recipient is expected to do with an in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Provider should accept or reject a new proposal.
    SessionRequest,
    /// Requester should pay for an accepted session.
    Payment,
    /// Provider was paid for a session.
    PaymentReceived,
    /// Provider received a review.
    Review,
}

/// In-app notification record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// User the notification is for.
    pub recipient: UserId,
    /// Short headline.
    pub subject: String,
    /// Body text.
    pub message: String,
    /// Session the notification refers to.
    pub session_id: Option<SessionId>,
    /// Whether the client should render an action button.
    pub actionable: bool,
    /// Kind of action, if any.
    pub action_type: Option<ActionType>,
    /// Review the notification refers to.
    pub review_id: Option<ReviewId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Creates a non-actionable notification about a session.
    #[must_use]
    pub fn about(
        recipient: UserId,
        session_id: SessionId,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            subject: subject.into(),
            message: message.into(),
            session_id: Some(session_id),
            actionable: false,
            action_type: None,
            review_id: None,
            created_at: Utc::now(),
        }
    }

    /// Marks the notification actionable with the given action.
    #[must_use]
    pub fn actionable(mut self, action: ActionType) -> Self {
        self.actionable = true;
        self.action_type = Some(action);
        self
    }

    /// Tags the notification with an action without making it actionable.
    #[must_use]
    pub fn tagged(mut self, action: ActionType) -> Self {
        self.action_type = Some(action);
        self
    }

    /// Links a review.
    #[must_use]
    pub fn with_review(mut self, review_id: ReviewId) -> Self {
        self.review_id = Some(review_id);
        self
    }
}

/// E-mail templates the marketplace sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    /// New proposal, sent to the provider.
    SessionRequest,
    /// Proposal accepted, sent to the requester.
    SessionAccepted,
    /// Proposal rejected, sent to the requester.
    SessionRejected,
    /// New review, sent to the provider.
    Review,
}

impl EmailTemplate {
    /// Subject line for the template.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::SessionRequest => "Booking Session Request",
            Self::SessionAccepted => "Booking Session Request Accepted",
            Self::SessionRejected => "Booking Session Request Rejected",
            Self::Review => "New Review on your Profile",
        }
    }

    /// Base name of the HTML and text template files.
    #[must_use]
    pub const fn template_name(&self) -> &'static str {
        match self {
            Self::SessionRequest => "booking_session_request",
            Self::SessionAccepted => "session_accept",
            Self::SessionRejected => "session_reject",
            Self::Review => "review",
        }
    }
}

/// Templated e-mail request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Template to render.
    pub template: EmailTemplate,
    /// Values substituted into the template.
    pub context: serde_json::Value,
}

impl EmailMessage {
    /// Creates an e-mail for `template` with the given render context.
    #[must_use]
    pub fn new(to: impl Into<String>, template: EmailTemplate, context: serde_json::Value) -> Self {
        Self {
            to: to.into(),
            template,
            context,
        }
    }
}

/// Anything handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dispatch {
    /// In-app notification.
    Notification(Notification),
    /// E-mail.
    Email(EmailMessage),
}

impl Dispatch {
    /// Returns the discriminator as a static string.
    #[must_use]
    pub const fn kind_str(&self) -> &'static str {
        match self {
            Self::Notification(_) => "notification",
            Self::Email(_) => "email",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_action() {
        let n = Notification::about(UserId::new(), SessionId::new(), "s", "m")
            .actionable(ActionType::Payment);
        assert!(n.actionable);
        assert_eq!(n.action_type, Some(ActionType::Payment));

        let t = Notification::about(UserId::new(), SessionId::new(), "s", "m")
            .tagged(ActionType::PaymentReceived);
        assert!(!t.actionable);
    }

    #[test]
    fn dispatch_serializes_with_kind_tag() {
        let email = Dispatch::Email(EmailMessage::new(
            "a@b.c",
            EmailTemplate::SessionAccepted,
            serde_json::json!({"price": 50}),
        ));
        let json = serde_json::to_string(&email).unwrap_or_default();
        assert!(json.contains("\"kind\":\"email\""));
        assert!(json.contains("session_accepted"));
        assert_eq!(email.kind_str(), "email");
    }
}
