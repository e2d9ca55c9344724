//! Wallet and review DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Currency, LineItem, Review, SessionId, TransactionId, UserId};
use crate::persistence::SettledSession;
use crate::service::{ReviewSummary, Wallet};

/// Query parameters for `GET /wallet`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WalletQuery {
    /// Earliest capture date, inclusive.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Latest capture date, inclusive.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// One settlement in a wallet.
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletTransactionDto {
    /// Payment record.
    pub transaction_id: TransactionId,
    /// Paid session.
    pub session_id: SessionId,
    /// Who paid.
    pub requester_id: UserId,
    /// Services of the session.
    pub line_items: Vec<LineItem>,
    /// Session price.
    pub cost: u64,
    /// Capture currency.
    pub currency: Currency,
    /// Captured amount in minor units.
    pub amount_minor: u64,
    /// Processor reference.
    pub payment_reference: String,
    /// Capture time.
    pub captured_at: DateTime<Utc>,
}

impl From<SettledSession> for WalletTransactionDto {
    fn from(settled: SettledSession) -> Self {
        let SettledSession {
            transaction,
            session,
        } = settled;
        Self {
            transaction_id: transaction.id,
            session_id: transaction.session_id,
            requester_id: session.requester,
            line_items: session.line_items,
            cost: session.total_price,
            currency: transaction.currency,
            amount_minor: transaction.amount_minor,
            payment_reference: transaction.payment_reference,
            captured_at: transaction.captured_at,
        }
    }
}

/// Response body for `GET /wallet`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WalletResponse {
    /// Current balance.
    pub total_earnings: i64,
    /// Settlements, newest first.
    pub transactions: Vec<WalletTransactionDto>,
    /// Reviews received.
    pub review_count: usize,
    /// Mean rating received, one decimal.
    pub average_rating: f64,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        Self {
            total_earnings: wallet.total_earnings,
            transactions: wallet
                .settlements
                .into_iter()
                .map(WalletTransactionDto::from)
                .collect(),
            review_count: wallet.review_count,
            average_rating: wallet.average_rating,
        }
    }
}

/// Response body for `GET /users/{id}/reviews`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewSummaryResponse {
    /// Number of reviews.
    pub count: usize,
    /// Mean rating, one decimal.
    pub average_rating: f64,
    /// Reviews, newest first.
    pub reviews: Vec<Review>,
}

impl From<ReviewSummary> for ReviewSummaryResponse {
    fn from(summary: ReviewSummary) -> Self {
        Self {
            count: summary.count,
            average_rating: summary.average_rating,
            reviews: summary.reviews,
        }
    }
}
