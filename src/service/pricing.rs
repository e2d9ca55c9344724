//! Pricing and availability for a proposal.
//!
//! [`quote`] is a pure function over the provider's profile and the catalog
//! entries fetched for the request; [`PricingResolver`] does the fetching.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use crate::domain::{CatalogEntry, LineItem, ServiceId, UserId, UserProfile};
use crate::error::GatewayError;
use crate::persistence::CatalogSource;

/// Total price and frozen line items for a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// Sum of the line items' unit costs.
    pub total_price: u64,
    /// Line items in request order.
    pub line_items: Vec<LineItem>,
}

/// Validates a selection against the provider's catalog and prices it.
///
/// # Errors
///
/// - [`GatewayError::Validation`] for an empty or duplicated selection, or
///   ids that are not active offerings of `provider`.
/// - [`GatewayError::ProviderUnavailable`] when `requested_date` falls on
///   the provider's off-day.
/// - [`GatewayError::CatalogIntegrity`] when a selected offering has no
///   cost or a negative one.
pub fn quote(
    provider: &UserProfile,
    requested_date: NaiveDate,
    requested: &[ServiceId],
    entries: &[CatalogEntry],
) -> Result<Quote, GatewayError> {
    if requested.is_empty() {
        return Err(GatewayError::validation(
            "requested_services",
            "select at least one service",
        ));
    }
    let mut seen = HashSet::with_capacity(requested.len());
    if let Some(dup) = requested.iter().find(|id| !seen.insert(**id)) {
        return Err(GatewayError::validation(
            "requested_services",
            format!("service {dup} selected more than once"),
        ));
    }

    let weekday = requested_date.weekday();
    if provider.off_day == Some(weekday) {
        return Err(GatewayError::ProviderUnavailable { weekday });
    }

    let mut line_items = Vec::with_capacity(requested.len());
    let mut unknown = Vec::new();
    let mut total_price: u64 = 0;
    for id in requested {
        let Some(entry) = entries
            .iter()
            .find(|e| e.service_id == *id && e.provider == provider.id && e.active)
        else {
            unknown.push(id.to_string());
            continue;
        };
        let unit_cost = entry
            .unit_cost
            .and_then(|cost| u64::try_from(cost).ok())
            .ok_or(GatewayError::CatalogIntegrity(entry.service_id))?;
        total_price = total_price
            .checked_add(unit_cost)
            .ok_or_else(|| GatewayError::Internal("proposal total overflows".to_string()))?;
        line_items.push(LineItem {
            service_id: entry.service_id,
            service_name: entry.display_name.clone(),
            unit_cost,
        });
    }

    if !unknown.is_empty() {
        return Err(GatewayError::validation(
            "requested_services",
            format!(
                "not offered by this provider: {}",
                unknown.join(", ")
            ),
        ));
    }

    Ok(Quote {
        total_price,
        line_items,
    })
}

/// Fetches provider and catalog data and runs [`quote`].
#[derive(Debug, Clone)]
pub struct PricingResolver {
    catalog: Arc<dyn CatalogSource>,
}

impl PricingResolver {
    /// Creates a resolver over the given catalog source.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self { catalog }
    }

    /// Prices a selection for `provider_id` on `requested_date`.
    ///
    /// Returns the provider's profile alongside the quote.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UserNotFound`] for an unknown provider and
    /// everything [`quote`] returns.
    pub async fn price_and_validate(
        &self,
        provider_id: UserId,
        requested_date: NaiveDate,
        line_item_ids: &[ServiceId],
    ) -> Result<(UserProfile, Quote), GatewayError> {
        let provider = self
            .catalog
            .user(provider_id)
            .await?
            .ok_or(GatewayError::UserNotFound(*provider_id.as_uuid()))?;
        let entries = self.catalog.entries(line_item_ids).await?;
        let quote = quote(&provider, requested_date, line_item_ids, &entries)?;
        Ok((provider, quote))
    }
}
