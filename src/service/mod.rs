//! Service layer: business logic orchestration.
//!
//! [`SessionService`] drives the booking state machine and calendar
//! queries, [`SettlementService`] captures payments and performs the paid
//! transition. Both depend only on the persistence traits and the domain
//! ports, injected at construction.

pub mod format;
pub mod pricing;
pub mod sandbox;
pub mod session_service;
pub mod settlement;

#[cfg(test)]
mod test_support;

pub use pricing::{PricingResolver, Quote};
pub use sandbox::SandboxProcessor;
pub use session_service::{CalendarView, ProposalRequest, ReviewSummary, SessionService};
pub use settlement::{PaymentIntentHandle, SettlementConfig, SettlementService, Wallet};
