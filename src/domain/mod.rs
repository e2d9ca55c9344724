//! Domain layer: booking sessions, catalog views, settlement records,
//! reviews, notifications and the ports to external collaborators.

pub mod catalog;
pub mod event_bus;
pub mod ids;
pub mod notification;
pub mod ports;
pub mod review;
pub mod session;
pub mod transaction;

pub use catalog::{CatalogEntry, UserProfile};
pub use event_bus::EventBus;
pub use ids::{ReviewId, ServiceId, SessionId, TransactionId, UserId};
pub use notification::{ActionType, Dispatch, EmailMessage, EmailTemplate, Notification};
pub use ports::{NotificationSink, PaymentProcessor};
pub use review::{Review, ReviewSubmission};
pub use session::{BookingSession, Decision, LineItem, SessionStatus};
pub use transaction::{Currency, Transaction};
