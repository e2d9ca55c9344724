//! Persistence layer: booking store, atomic units of work, catalog lookup.
//!
//! [`BookingStore`] is the read side plus the entry point to a
//! [`UnitOfWork`]. Every transition that mutates shared rows (session
//! status, provider balance, transaction and review inserts) runs inside
//! one unit of work: the session row is locked by
//! [`UnitOfWork::lock_session`] and nothing is visible to other callers
//! until [`UnitOfWork::commit`]. Dropping an uncommitted unit discards
//! every staged write.
//!
//! Two implementations ship: [`postgres::PostgresStore`] on `sqlx::PgPool`
//! with `SELECT ... FOR UPDATE` row locks, and [`memory::MemoryStore`] for
//! development and tests.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    BookingSession, CatalogEntry, Review, ServiceId, SessionId, Transaction, UserId, UserProfile,
};
use crate::error::GatewayError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A settlement record joined with the session it paid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledSession {
    /// The payment record.
    pub transaction: Transaction,
    /// The session, as currently stored.
    pub session: BookingSession,
}

/// Read access to sessions and the factory for units of work.
#[async_trait]
pub trait BookingStore: Send + Sync + fmt::Debug {
    /// Starts an atomic unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, GatewayError>;

    /// Loads a session without locking it.
    async fn session(&self, id: SessionId) -> Result<Option<BookingSession>, GatewayError>;

    /// Sessions of `user` in an occupying status that intersect
    /// `[range_start, range_end]`, ordered by requested date.
    async fn find_overlapping(
        &self,
        user: UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BookingSession>, GatewayError>;

    /// Settlements of sessions provided by `provider`, newest first,
    /// optionally restricted to capture dates within `[from, to]`.
    async fn settlements_for_provider(
        &self,
        provider: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SettledSession>, GatewayError>;

    /// Reviews about `subject`, newest first.
    async fn reviews_for(&self, subject: UserId) -> Result<Vec<Review>, GatewayError>;
}

/// One all-or-nothing sequence of writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Loads a session and holds its row lock until the unit ends.
    async fn lock_session(&mut self, id: SessionId) -> Result<Option<BookingSession>, GatewayError>;

    /// Stages a new session.
    async fn insert_session(&mut self, session: &BookingSession) -> Result<(), GatewayError>;

    /// Stages the new state of an existing session.
    async fn update_session(&mut self, session: &BookingSession) -> Result<(), GatewayError>;

    /// Stages a settlement record. Fails if the session already has one.
    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), GatewayError>;

    /// Adds `amount` to the provider's balance and returns the new balance.
    async fn credit_balance(&mut self, provider: UserId, amount: u64) -> Result<i64, GatewayError>;

    /// Stages a review. Fails if the session already has one.
    async fn insert_review(&mut self, review: &Review) -> Result<(), GatewayError>;

    /// Makes every staged write visible at once. Dropping the unit
    /// without calling this discards every staged write.
    async fn commit(self: Box<Self>) -> Result<(), GatewayError>;
}

/// Read-only lookup of users and catalog offerings.
#[async_trait]
pub trait CatalogSource: Send + Sync + fmt::Debug {
    /// Loads a user profile.
    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, GatewayError>;

    /// Loads the catalog entries for `ids`. Unknown ids are skipped.
    async fn entries(&self, ids: &[ServiceId]) -> Result<Vec<CatalogEntry>, GatewayError>;
}

/// Converts a domain amount to a signed database column value.
pub(crate) fn to_db_amount(amount: u64) -> Result<i64, GatewayError> {
    i64::try_from(amount)
        .map_err(|_| GatewayError::Internal(format!("amount {amount} exceeds storage range")))
}

/// Converts a signed database column value back to a domain amount.
pub(crate) fn from_db_amount(amount: i64) -> Result<u64, GatewayError> {
    u64::try_from(amount)
        .map_err(|_| GatewayError::Internal(format!("negative amount {amount} in storage")))
}
