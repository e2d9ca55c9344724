//! Read-only views of the provider catalog.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use super::{ServiceId, UserId};

/// One published offering as reported by the catalog source.
///
/// `unit_cost` is kept as the raw signed value the source holds; pricing
/// rejects missing or negative costs as data errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Offering identifier.
    pub service_id: ServiceId,
    /// Provider that publishes the offering.
    pub provider: UserId,
    /// Display name.
    pub display_name: String,
    /// Cost per unit in whole currency units, if set.
    pub unit_cost: Option<i64>,
    /// Whether the offering can currently be booked.
    pub active: bool,
}

/// User attributes the booking core depends on.
///
/// `off_day` and `balance` are only meaningful for providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Display name used in notifications.
    pub full_name: String,
    /// Contact address for e-mails.
    pub email: String,
    /// Weekly day off, if any.
    pub off_day: Option<Weekday>,
    /// Accumulated earnings in whole currency units.
    pub balance: i64,
}

/// Parses a stored weekday name, ignoring case (`"monday"`, `"MON"`).
#[must_use]
pub fn parse_off_day(raw: &str) -> Option<Weekday> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<Weekday>().ok()
}
