//! Process-local store for development and tests.
//!
//! All state sits behind one [`tokio::sync::Mutex`]. A unit of work owns
//! the guard for its whole lifetime, so transitions are serialized, and
//! keeps its writes in a staging area that is applied to the state only on
//! commit.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingStore, CatalogSource, SettledSession, UnitOfWork, to_db_amount};
use crate::domain::{
    BookingSession, CatalogEntry, Review, ServiceId, SessionId, Transaction, UserId, UserProfile,
};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, UserProfile>,
    catalog: HashMap<ServiceId, CatalogEntry>,
    sessions: HashMap<SessionId, BookingSession>,
    transactions: Vec<Transaction>,
    reviews: Vec<Review>,
}

/// In-memory [`BookingStore`] and [`CatalogSource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user profile.
    pub async fn upsert_user(&self, profile: UserProfile) {
        self.state.lock().await.users.insert(profile.id, profile);
    }

    /// Inserts or replaces a catalog entry.
    pub async fn upsert_entry(&self, entry: CatalogEntry) {
        self.state
            .lock()
            .await
            .catalog
            .insert(entry.service_id, entry);
    }

    /// Returns the user's balance, if the user exists.
    pub async fn balance(&self, user: UserId) -> Option<i64> {
        self.state.lock().await.users.get(&user).map(|u| u.balance)
    }

    /// Number of settlement records for `session`.
    pub async fn transaction_count(&self, session: SessionId) -> usize {
        self.state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|t| t.session_id == session)
            .count()
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, GatewayError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            sessions: HashMap::new(),
            transactions: Vec::new(),
            reviews: Vec::new(),
            credits: HashMap::new(),
        }))
    }

    async fn session(&self, id: SessionId) -> Result<Option<BookingSession>, GatewayError> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn find_overlapping(
        &self,
        user: UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BookingSession>, GatewayError> {
        let state = self.state.lock().await;
        let mut found: Vec<BookingSession> = state
            .sessions
            .values()
            .filter(|s| s.involves(user) && s.overlaps(range_start, range_end))
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.requested_date, s.start_timestamp));
        Ok(found)
    }

    async fn settlements_for_provider(
        &self,
        provider: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SettledSession>, GatewayError> {
        let state = self.state.lock().await;
        let mut settled: Vec<SettledSession> = state
            .transactions
            .iter()
            .filter(|t| {
                let day = t.captured_at.date_naive();
                from.is_none_or(|start| day >= start) && to.is_none_or(|end| day <= end)
            })
            .filter_map(|t| {
                state
                    .sessions
                    .get(&t.session_id)
                    .filter(|s| s.provider == provider)
                    .map(|s| SettledSession {
                        transaction: t.clone(),
                        session: s.clone(),
                    })
            })
            .collect();
        settled.sort_by(|a, b| b.transaction.captured_at.cmp(&a.transaction.captured_at));
        Ok(settled)
    }

    async fn reviews_for(&self, subject: UserId) -> Result<Vec<Review>, GatewayError> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state
            .reviews
            .iter()
            .filter(|r| r.subject == subject)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_on.cmp(&a.created_on));
        Ok(reviews)
    }
}

#[async_trait]
impl CatalogSource for MemoryStore {
    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, GatewayError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn entries(&self, ids: &[ServiceId]) -> Result<Vec<CatalogEntry>, GatewayError> {
        let state = self.state.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.catalog.get(id).cloned())
            .collect())
    }
}

/// Unit of work over [`MemoryStore`]; holds the store lock until dropped.
struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    sessions: HashMap<SessionId, BookingSession>,
    transactions: Vec<Transaction>,
    reviews: Vec<Review>,
    credits: HashMap<UserId, i64>,
}

impl MemoryUnitOfWork {
    fn session_exists(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id) || self.guard.sessions.contains_key(&id)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_session(&mut self, id: SessionId) -> Result<Option<BookingSession>, GatewayError> {
        Ok(self
            .sessions
            .get(&id)
            .or_else(|| self.guard.sessions.get(&id))
            .cloned())
    }

    async fn insert_session(&mut self, session: &BookingSession) -> Result<(), GatewayError> {
        if self.session_exists(session.id) {
            return Err(GatewayError::PersistenceError(format!(
                "session {} already exists",
                session.id
            )));
        }
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update_session(&mut self, session: &BookingSession) -> Result<(), GatewayError> {
        if !self.session_exists(session.id) {
            return Err(GatewayError::SessionNotFound(session.id));
        }
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), GatewayError> {
        let duplicate = self
            .guard
            .transactions
            .iter()
            .chain(self.transactions.iter())
            .any(|t| t.session_id == transaction.session_id);
        if duplicate {
            return Err(GatewayError::PersistenceError(format!(
                "session {} already has a transaction",
                transaction.session_id
            )));
        }
        self.transactions.push(transaction.clone());
        Ok(())
    }

    async fn credit_balance(&mut self, provider: UserId, amount: u64) -> Result<i64, GatewayError> {
        let base = self
            .guard
            .users
            .get(&provider)
            .map(|u| u.balance)
            .ok_or(GatewayError::UserNotFound(*provider.as_uuid()))?;
        let credit = self.credits.entry(provider).or_insert(0);
        *credit = credit
            .checked_add(to_db_amount(amount)?)
            .ok_or_else(|| GatewayError::Internal("balance overflow".to_string()))?;
        base.checked_add(*credit)
            .ok_or_else(|| GatewayError::Internal("balance overflow".to_string()))
    }

    async fn insert_review(&mut self, review: &Review) -> Result<(), GatewayError> {
        let duplicate = self
            .guard
            .reviews
            .iter()
            .chain(self.reviews.iter())
            .any(|r| r.session_id == review.session_id);
        if duplicate {
            return Err(GatewayError::PersistenceError(format!(
                "session {} already has a review",
                review.session_id
            )));
        }
        self.reviews.push(review.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), GatewayError> {
        let Self {
            mut guard,
            sessions,
            transactions,
            reviews,
            credits,
        } = *self;
        for (provider, credit) in credits {
            if let Some(user) = guard.users.get_mut(&provider) {
                user.balance = user.balance.saturating_add(credit);
            }
        }
        guard.sessions.extend(sessions);
        guard.transactions.extend(transactions);
        guard.reviews.extend(reviews);
        Ok(())
    }
}
