//! Row shapes of the PostgreSQL tables and their domain conversions.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::from_db_amount;
use crate::domain::catalog::parse_off_day;
use crate::domain::{
    BookingSession, CatalogEntry, Currency, LineItem, Review, ReviewId, ServiceId, SessionId,
    SessionStatus, Transaction, TransactionId, UserId, UserProfile,
};
use crate::error::GatewayError;

/// Column list matching [`SessionRow`].
pub const SESSION_COLUMNS: &str = "id, requester_id, provider_id, line_items, requested_date, \
     start_timestamp, end_timestamp, status, total_price, reviewed, created_at";

/// A row of `booking_sessions`.
pub type SessionRow = (
    Uuid,
    Uuid,
    Uuid,
    serde_json::Value,
    NaiveDate,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    String,
    i64,
    bool,
    DateTime<Utc>,
);

/// Converts a `booking_sessions` row into a [`BookingSession`].
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] for rows that violate domain
/// invariants (unknown status, negative price, malformed line items).
pub fn session_from_row(row: SessionRow) -> Result<BookingSession, GatewayError> {
    let (
        id,
        requester,
        provider,
        line_items,
        requested_date,
        start_timestamp,
        end_timestamp,
        status,
        total_price,
        reviewed,
        created_at,
    ) = row;
    let line_items: Vec<LineItem> = serde_json::from_value(line_items)
        .map_err(|e| GatewayError::Internal(format!("malformed line items on {id}: {e}")))?;
    Ok(BookingSession {
        id: SessionId::from_uuid(id),
        requester: UserId::from_uuid(requester),
        provider: UserId::from_uuid(provider),
        line_items,
        requested_date,
        start_timestamp,
        end_timestamp,
        status: status.parse::<SessionStatus>()?,
        total_price: from_db_amount(total_price)?,
        reviewed,
        created_at,
    })
}

/// Column list matching [`TransactionRow`].
pub const TRANSACTION_COLUMNS: &str =
    "id, session_id, currency, amount_minor, payment_reference, captured_at";

/// A row of `transactions`.
pub type TransactionRow = (Uuid, Uuid, String, i64, String, DateTime<Utc>);

/// Converts a `transactions` row into a [`Transaction`].
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] for malformed currency or amount.
pub fn transaction_from_row(row: TransactionRow) -> Result<Transaction, GatewayError> {
    let (id, session_id, currency, amount_minor, payment_reference, captured_at) = row;
    let currency = Currency::parse(&currency)
        .map_err(|e| GatewayError::Internal(format!("stored transaction {id}: {e}")))?;
    Ok(Transaction {
        id: TransactionId::from_uuid(id),
        session_id: SessionId::from_uuid(session_id),
        currency,
        amount_minor: from_db_amount(amount_minor)?,
        payment_reference,
        captured_at,
    })
}

/// A row of `reviews`.
pub type ReviewRow = (Uuid, Uuid, Uuid, Uuid, i16, Option<String>, DateTime<Utc>);

/// Converts a `reviews` row into a [`Review`].
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] for an out-of-range rating.
pub fn review_from_row(row: ReviewRow) -> Result<Review, GatewayError> {
    let (id, session_id, author, subject, rating, comments, created_on) = row;
    let rating = u8::try_from(rating)
        .map_err(|_| GatewayError::Internal(format!("stored review {id} has rating {rating}")))?;
    Ok(Review {
        id: ReviewId::from_uuid(id),
        session_id: SessionId::from_uuid(session_id),
        author: UserId::from_uuid(author),
        subject: UserId::from_uuid(subject),
        rating,
        comments,
        created_on,
    })
}

/// A row of `users`.
pub type UserRow = (Uuid, String, String, Option<String>, i64);

/// Converts a `users` row into a [`UserProfile`]. Unparseable off-days
/// are treated as no off-day.
#[must_use]
pub fn user_from_row(row: UserRow) -> UserProfile {
    let (id, full_name, email, off_day, balance) = row;
    UserProfile {
        id: UserId::from_uuid(id),
        full_name,
        email,
        off_day: off_day.as_deref().and_then(parse_off_day),
        balance,
    }
}

/// A row of `catalog_entries`.
pub type CatalogRow = (Uuid, Uuid, String, Option<i64>, bool);

/// Converts a `catalog_entries` row into a [`CatalogEntry`].
#[must_use]
pub fn entry_from_row(row: CatalogRow) -> CatalogEntry {
    let (id, provider, display_name, unit_cost, active) = row;
    CatalogEntry {
        service_id: ServiceId::from_uuid(id),
        provider: UserId::from_uuid(provider),
        display_name,
        unit_cost,
        active,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn row(status: &str, total_price: i64, line_items: serde_json::Value) -> SessionRow {
        let now = Utc::now();
        (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            line_items,
            now.date_naive(),
            now,
            None,
            status.to_string(),
            total_price,
            false,
            now,
        )
    }

    #[test]
    fn session_row_converts() {
        let items = serde_json::json!([
            {"service_id": Uuid::new_v4(), "service_name": "Tutoring", "unit_cost": 30}
        ]);
        let Ok(session) = session_from_row(row("accepted", 30, items)) else {
            panic!("conversion failed");
        };
        assert_eq!(session.status, SessionStatus::Accepted);
        assert_eq!(session.line_items.len(), 1);
        assert_eq!(session.total_price, 30);
    }

    #[test]
    fn corrupt_session_rows_are_rejected() {
        assert!(session_from_row(row("sent", 0, serde_json::json!([]))).is_err());
        assert!(session_from_row(row("paid", -5, serde_json::json!([]))).is_err());
        assert!(session_from_row(row("paid", 5, serde_json::json!({"x": 1}))).is_err());
    }

    #[test]
    fn user_row_parses_off_day() {
        let profile = user_from_row((
            Uuid::new_v4(),
            "Sam".to_string(),
            "sam@example.com".to_string(),
            Some("SUNDAY".to_string()),
            0,
        ));
        assert_eq!(profile.off_day, Some(chrono::Weekday::Sun));
    }
}
