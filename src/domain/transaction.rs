//! Settlement records and currency codes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{SessionId, TransactionId};
use crate::error::GatewayError;

/// Lower-case ISO-4217 style currency code (`"usd"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "usd")]
pub struct Currency(String);

impl Currency {
    /// Normalises and validates a three-letter alphabetic code.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Validation`] for anything other than three
    /// ASCII letters.
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let code = raw.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(GatewayError::validation(
                "currency",
                format!("expected a 3-letter currency code, got {raw:?}"),
            ));
        }
        Ok(Self(code.to_ascii_lowercase()))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment record created by a successful settlement. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Record identifier.
    pub id: TransactionId,
    /// Settled session. At most one record exists per session.
    pub session_id: SessionId,
    /// Currency the capture was made in.
    pub currency: Currency,
    /// Captured amount in minor units.
    pub amount_minor: u64,
    /// Reference issued by the payment processor.
    pub payment_reference: String,
    /// Capture time.
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn currency_is_lower_cased() {
        let Ok(c) = Currency::parse(" USD ") else {
            panic!("valid currency");
        };
        assert_eq!(c.as_str(), "usd");
    }

    #[test]
    fn currency_rejects_bad_codes() {
        for raw in ["", "us", "usdt", "u$d", "12a"] {
            assert!(Currency::parse(raw).is_err(), "{raw}");
        }
    }
}
