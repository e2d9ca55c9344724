//! # wafina-gateway
//!
//! REST gateway for the booking core of the Wafina services marketplace.
//!
//! A requester proposes a session to a provider, the provider accepts or
//! rejects it, the requester pays through a payment processor, and a
//! review completes the session. Side effects (notifications, e-mails,
//! provider balance credits) are gated on those transitions.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SessionService / SettlementService (service/)
//!     ├── PricingResolver (service/)
//!     │
//!     ├── BookingSession state machine (domain/)
//!     ├── EventBus → NotificationSink (domain/)
//!     ├── PaymentProcessor (domain/ports)
//!     │
//!     └── BookingStore: PostgreSQL or in-memory (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
