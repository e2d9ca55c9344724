//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::models::{
    CatalogRow, ReviewRow, SESSION_COLUMNS, SessionRow, TRANSACTION_COLUMNS, TransactionRow,
    UserRow, entry_from_row, review_from_row, session_from_row, transaction_from_row,
    user_from_row,
};
use super::{BookingStore, CatalogSource, SettledSession, UnitOfWork, to_db_amount};
use crate::domain::{
    BookingSession, CatalogEntry, Review, ServiceId, SessionId, SessionStatus, Transaction,
    UserId, UserProfile,
};
use crate::error::GatewayError;

/// Settlements of one provider. Capture dates are bucketed by UTC day,
/// whatever the connection's `TimeZone`.
const PROVIDER_SETTLEMENTS_SQL: &str =
    "SELECT t.id, t.session_id, t.currency, t.amount_minor, t.payment_reference, t.captured_at \
     FROM transactions t JOIN booking_sessions s ON s.id = t.session_id \
     WHERE s.provider_id = $1 \
     AND ($2::date IS NULL OR (t.captured_at AT TIME ZONE 'UTC')::date >= $2) \
     AND ($3::date IS NULL OR (t.captured_at AT TIME ZONE 'UTC')::date <= $3) \
     ORDER BY t.captured_at DESC";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, GatewayError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }

    async fn session(&self, id: SessionId) -> Result<Option<BookingSession>, GatewayError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM booking_sessions WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn find_overlapping(
        &self,
        user: UserId,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BookingSession>, GatewayError> {
        let occupying: Vec<&str> = SessionStatus::OCCUPYING
            .iter()
            .map(SessionStatus::as_str)
            .collect();

        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM booking_sessions \
             WHERE (requester_id = $1 OR provider_id = $1) \
             AND status = ANY($2) \
             AND end_timestamp IS NOT NULL \
             AND start_timestamp <= $4 AND end_timestamp >= $3 \
             ORDER BY requested_date ASC, start_timestamp ASC"
        ))
        .bind(user.as_uuid())
        .bind(&occupying)
        .bind(range_start)
        .bind(range_end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(session_from_row).collect()
    }

    async fn settlements_for_provider(
        &self,
        provider: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<SettledSession>, GatewayError> {
        let tx_rows = sqlx::query_as::<_, TransactionRow>(PROVIDER_SETTLEMENTS_SQL)
            .bind(provider.as_uuid())
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        let transactions = tx_rows
            .into_iter()
            .map(transaction_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let session_ids: Vec<Uuid> = transactions
            .iter()
            .map(|t| *t.session_id.as_uuid())
            .collect();
        let sessions = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM booking_sessions WHERE id = ANY($1)"
        ))
        .bind(&session_ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(session_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(transactions
            .into_iter()
            .filter_map(|transaction| {
                sessions
                    .iter()
                    .find(|s| s.id == transaction.session_id)
                    .map(|session| SettledSession {
                        transaction,
                        session: session.clone(),
                    })
            })
            .collect())
    }

    async fn reviews_for(&self, subject: UserId) -> Result<Vec<Review>, GatewayError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            "SELECT id, session_id, author_id, subject_id, rating, comments, created_on \
             FROM reviews WHERE subject_id = $1 ORDER BY created_on DESC",
        )
        .bind(subject.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(review_from_row).collect()
    }
}

#[async_trait]
impl CatalogSource for PostgresStore {
    async fn user(&self, id: UserId) -> Result<Option<UserProfile>, GatewayError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, full_name, email, off_day, balance FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(user_from_row))
    }

    async fn entries(&self, ids: &[ServiceId]) -> Result<Vec<CatalogEntry>, GatewayError> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query_as::<_, CatalogRow>(
            "SELECT id, provider_id, display_name, unit_cost, active \
             FROM catalog_entries WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(entry_from_row).collect())
    }
}

/// Unit of work backed by a `sqlx` transaction. Dropping it rolls back.
struct PostgresUnitOfWork {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn lock_session(&mut self, id: SessionId) -> Result<Option<BookingSession>, GatewayError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM booking_sessions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(session_from_row).transpose()
    }

    async fn insert_session(&mut self, session: &BookingSession) -> Result<(), GatewayError> {
        let line_items = serde_json::to_value(&session.line_items)
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO booking_sessions (id, requester_id, provider_id, line_items, requested_date, \
             start_timestamp, end_timestamp, status, total_price, reviewed, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(session.id.as_uuid())
        .bind(session.requester.as_uuid())
        .bind(session.provider.as_uuid())
        .bind(&line_items)
        .bind(session.requested_date)
        .bind(session.start_timestamp)
        .bind(session.end_timestamp)
        .bind(session.status.as_str())
        .bind(to_db_amount(session.total_price)?)
        .bind(session.reviewed)
        .bind(session.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn update_session(&mut self, session: &BookingSession) -> Result<(), GatewayError> {
        // Line items and price are frozen at proposal time and never rewritten.
        let result = sqlx::query(
            "UPDATE booking_sessions SET end_timestamp = $2, status = $3, reviewed = $4 \
             WHERE id = $1",
        )
        .bind(session.id.as_uuid())
        .bind(session.end_timestamp)
        .bind(session.status.as_str())
        .bind(session.reviewed)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(GatewayError::SessionNotFound(session.id));
        }
        Ok(())
    }

    async fn insert_transaction(&mut self, transaction: &Transaction) -> Result<(), GatewayError> {
        sqlx::query(&format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(transaction.id.as_uuid())
        .bind(transaction.session_id.as_uuid())
        .bind(transaction.currency.as_str())
        .bind(to_db_amount(transaction.amount_minor)?)
        .bind(&transaction.payment_reference)
        .bind(transaction.captured_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn credit_balance(&mut self, provider: UserId, amount: u64) -> Result<i64, GatewayError> {
        let balance = sqlx::query_scalar::<_, i64>(
            "UPDATE users SET balance = balance + $1 WHERE id = $2 RETURNING balance",
        )
        .bind(to_db_amount(amount)?)
        .bind(provider.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        balance.ok_or(GatewayError::UserNotFound(*provider.as_uuid()))
    }

    async fn insert_review(&mut self, review: &Review) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO reviews (id, session_id, author_id, subject_id, rating, comments, created_on) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review.id.as_uuid())
        .bind(review.session_id.as_uuid())
        .bind(review.author.as_uuid())
        .bind(review.subject.as_uuid())
        .bind(i16::from(review.rating))
        .bind(review.comments.as_deref())
        .bind(review.created_on)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), GatewayError> {
        self.tx.commit().await?;
        Ok(())
    }
}
