//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::{EventBus, NotificationSink, PaymentProcessor};
use crate::persistence::{BookingStore, CatalogSource};
use crate::service::{SessionService, SettlementConfig, SettlementService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Booking state machine and calendar queries.
    pub sessions: Arc<SessionService>,
    /// Payment capture and wallet queries.
    pub settlement: Arc<SettlementService>,
    /// Notification bus, for the log drain and other subscribers.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wires both services over one store, with `event_bus` as the
    /// notification sink.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn CatalogSource>,
        processor: Arc<dyn PaymentProcessor>,
        event_bus: EventBus,
        settlement: SettlementConfig,
    ) -> Self {
        let notifier: Arc<dyn NotificationSink> = Arc::new(event_bus.clone());
        let sessions = Arc::new(SessionService::new(
            Arc::clone(&store),
            Arc::clone(&catalog),
            Arc::clone(&notifier),
        ));
        let settlement = Arc::new(SettlementService::new(
            store, catalog, processor, notifier, settlement,
        ));
        Self {
            sessions,
            settlement,
            event_bus,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::domain::{CatalogEntry, Currency, Dispatch, ServiceId, UserId, UserProfile};
    use crate::persistence::MemoryStore;
    use crate::service::{ProposalRequest, SandboxProcessor};

    fn user(name: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(),
            full_name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            off_day: None,
            balance: 0,
        }
    }

    #[tokio::test]
    async fn services_notify_through_the_shared_bus() {
        let store = MemoryStore::new();
        let requester = user("Rae");
        let provider = user("Pat");
        store.upsert_user(requester.clone()).await;
        store.upsert_user(provider.clone()).await;
        let service_id = ServiceId::new();
        store
            .upsert_entry(CatalogEntry {
                service_id,
                provider: provider.id,
                display_name: "Cut".to_string(),
                unit_cost: Some(20),
                active: true,
            })
            .await;

        let Ok(usd) = Currency::parse("usd") else {
            panic!("valid currency");
        };
        let shared = Arc::new(store);
        let state = AppState::new(
            Arc::clone(&shared) as Arc<dyn BookingStore>,
            shared as Arc<dyn CatalogSource>,
            Arc::new(SandboxProcessor::new()),
            EventBus::new(16),
            SettlementConfig {
                supported_currencies: vec![usd],
                capture_timeout: Duration::from_secs(1),
                publishable_key: "pk_test".to_string(),
            },
        );
        let mut rx = state.event_bus.subscribe();

        let Some(date) = NaiveDate::from_ymd_opt(2030, 1, 8) else {
            panic!("valid date");
        };
        let Some(start) = Utc.with_ymd_and_hms(2030, 1, 8, 10, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let proposed = state
            .sessions
            .propose(ProposalRequest {
                requester: requester.id,
                provider: provider.id,
                requested_date: date,
                start_timestamp: start,
                service_ids: vec![service_id],
            })
            .await;
        assert!(proposed.is_ok());

        let Ok(Dispatch::Notification(n)) = rx.recv().await else {
            panic!("expected a notification on the bus");
        };
        assert_eq!(n.recipient, provider.id);
    }
}
