//! Fixtures shared by the service tests.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc, Weekday};

use super::{SessionService, SettlementConfig, SettlementService};
use crate::domain::ports::{
    CaptureOutcome, CaptureRequest, DeliveryError, NotificationSink, PaymentProcessor,
    ProcessorError,
};
use crate::domain::{
    CatalogEntry, Currency, EmailMessage, EventBus, Notification, ServiceId, UserId, UserProfile,
};
use crate::persistence::{BookingStore, CatalogSource, MemoryStore};

/// Processor double with a scripted answer and a call counter.
#[derive(Debug)]
pub struct ScriptedProcessor {
    succeed: bool,
    transport_error: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProcessor {
    pub fn approving() -> Self {
        Self {
            succeed: true,
            transport_error: false,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            succeed: false,
            ..Self::approving()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            transport_error: true,
            ..Self::approving()
        }
    }

    pub fn stalled(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::approving()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentProcessor for ScriptedProcessor {
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureOutcome, ProcessorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.transport_error {
            return Err(ProcessorError("connection reset".to_string()));
        }
        Ok(CaptureOutcome {
            success: self.succeed,
            reference: format!("pi_test_{}", request.session_id),
        })
    }
}

/// Sink that refuses everything.
#[derive(Debug)]
pub struct BrokenSink;

#[async_trait]
impl NotificationSink for BrokenSink {
    async fn notify(&self, _notification: Notification) -> Result<(), DeliveryError> {
        Err(DeliveryError("smtp down".to_string()))
    }

    async fn email(&self, _email: EmailMessage) -> Result<(), DeliveryError> {
        Err(DeliveryError("smtp down".to_string()))
    }
}

/// A seeded marketplace: one requester, one provider with two offerings.
#[derive(Debug)]
pub struct Fixture {
    pub store: MemoryStore,
    pub bus: EventBus,
    pub processor: Arc<ScriptedProcessor>,
    pub sessions: Arc<SessionService>,
    pub settlement: Arc<SettlementService>,
    pub requester: UserId,
    pub provider: UserId,
    /// Costs 20.
    pub cut: ServiceId,
    /// Costs 30.
    pub colour: ServiceId,
}

impl Fixture {
    pub async fn new(processor: ScriptedProcessor) -> Self {
        Self::build(processor, None).await
    }

    pub async fn with_sink(processor: ScriptedProcessor, sink: Arc<dyn NotificationSink>) -> Self {
        Self::build(processor, Some(sink)).await
    }

    async fn build(processor: ScriptedProcessor, sink: Option<Arc<dyn NotificationSink>>) -> Self {
        let store = MemoryStore::new();
        let requester = UserId::new();
        let provider = UserId::new();
        store
            .upsert_user(UserProfile {
                id: requester,
                full_name: "Rae Requester".to_string(),
                email: "rae@example.com".to_string(),
                off_day: None,
                balance: 0,
            })
            .await;
        store
            .upsert_user(UserProfile {
                id: provider,
                full_name: "Pat Provider".to_string(),
                email: "pat@example.com".to_string(),
                off_day: Some(Weekday::Mon),
                balance: 0,
            })
            .await;

        let cut = ServiceId::new();
        let colour = ServiceId::new();
        for (id, name, cost) in [(cut, "Cut", 20), (colour, "Colour", 30)] {
            store
                .upsert_entry(CatalogEntry {
                    service_id: id,
                    provider,
                    display_name: name.to_string(),
                    unit_cost: Some(cost),
                    active: true,
                })
                .await;
        }

        let bus = EventBus::new(1000);
        let sink: Arc<dyn NotificationSink> = match sink {
            Some(sink) => sink,
            None => Arc::new(bus.clone()),
        };
        let processor = Arc::new(processor);
        let shared = Arc::new(store.clone());
        let bookings = Arc::clone(&shared) as Arc<dyn BookingStore>;
        let catalog: Arc<dyn CatalogSource> = shared;

        let sessions = Arc::new(SessionService::new(
            Arc::clone(&bookings),
            Arc::clone(&catalog),
            Arc::clone(&sink),
        ));
        let Ok(usd) = Currency::parse("usd") else {
            panic!("valid currency");
        };
        let settlement = Arc::new(SettlementService::new(
            bookings,
            catalog,
            Arc::clone(&processor) as Arc<dyn PaymentProcessor>,
            sink,
            SettlementConfig {
                supported_currencies: vec![usd],
                capture_timeout: Duration::from_millis(200),
                publishable_key: "pk_test".to_string(),
            },
        ));

        Self {
            store,
            bus,
            processor,
            sessions,
            settlement,
            requester,
            provider,
            cut,
            colour,
        }
    }
}

/// A Tuesday well in the future.
pub fn tuesday() -> NaiveDate {
    let Some(date) = NaiveDate::from_ymd_opt(2030, 1, 8) else {
        panic!("valid date");
    };
    date
}

/// A Monday well in the future.
pub fn monday() -> NaiveDate {
    let Some(date) = NaiveDate::from_ymd_opt(2030, 1, 7) else {
        panic!("valid date");
    };
    date
}

/// `date` at `hour`:00 UTC.
pub fn at(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
        panic!("valid time");
    };
    Utc.from_utc_datetime(&naive)
}
