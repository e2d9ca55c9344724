//! Settlement coordinator: payment capture followed by the atomic paid
//! transition.
//!
//! The capture call happens before any lock is taken. Only when the
//! processor reports success does a unit of work re-check the session
//! under its row lock, insert the [`Transaction`], mark the session paid
//! and credit the provider. A capture whose local commit does not happen
//! is logged as orphaned for out-of-band reconciliation.
//!
//! Settlements of the same session are single-flight within a process:
//! a second caller waits for the first to finish, then sees the paid
//! status and fails with [`GatewayError::AlreadySettled`] without reaching
//! the processor. Across processes the processor's per-session idempotency
//! (see [`PaymentProcessor::capture`]) keeps the charge single.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use utoipa::ToSchema;

use super::session_service::deliver;
use crate::domain::ports::{CaptureOutcome, CaptureRequest};
use crate::domain::review::average_rating;
use crate::domain::{
    ActionType, BookingSession, Currency, Notification, NotificationSink, PaymentProcessor,
    SessionId, Transaction, TransactionId, UserId,
};
use crate::error::GatewayError;
use crate::persistence::{BookingStore, CatalogSource, SettledSession};

/// Settlement settings.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Currencies `settle` accepts.
    pub supported_currencies: Vec<Currency>,
    /// Upper bound on a single capture call.
    pub capture_timeout: Duration,
    /// Public key handed to clients alongside the client secret.
    pub publishable_key: String,
}

/// What a client needs to confirm a captured payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PaymentIntentHandle {
    /// Settled session.
    pub session_id: SessionId,
    /// Created payment record.
    pub transaction_id: TransactionId,
    /// Processor-issued reference.
    pub client_secret: String,
    /// Processor publishable key.
    pub publishable_key: String,
    /// Captured amount in minor units.
    pub amount_minor: u64,
    /// Lower-case ISO currency code.
    pub currency: Currency,
}

/// A provider's earnings.
#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    /// Current balance.
    pub total_earnings: i64,
    /// Settlements, newest first.
    pub settlements: Vec<SettledSession>,
    /// Reviews received.
    pub review_count: usize,
    /// Mean rating received, one decimal.
    pub average_rating: f64,
}

/// Runs settlements and wallet queries.
#[derive(Debug, Clone)]
pub struct SettlementService {
    store: Arc<dyn BookingStore>,
    catalog: Arc<dyn CatalogSource>,
    processor: Arc<dyn PaymentProcessor>,
    notifier: Arc<dyn NotificationSink>,
    config: SettlementConfig,
    in_flight: Arc<Mutex<HashMap<SessionId, Arc<Mutex<()>>>>>,
}

impl SettlementService {
    /// Creates a new `SettlementService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        catalog: Arc<dyn CatalogSource>,
        processor: Arc<dyn PaymentProcessor>,
        notifier: Arc<dyn NotificationSink>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            processor,
            notifier,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Captures payment for an accepted session and marks it paid.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Validation`] for an unsupported currency.
    /// - [`GatewayError::SessionNotFound`] / [`GatewayError::Forbidden`]
    ///   when the session does not exist or `payer` is not its requester.
    /// - [`GatewayError::AlreadySettled`] once paid, before any processor
    ///   call.
    /// - [`GatewayError::IllegalTransition`] when the session is not
    ///   accepted.
    /// - [`GatewayError::SettlementFailed`] when the processor declines,
    ///   errors or times out. Nothing is written in that case.
    pub async fn settle(
        &self,
        session_id: SessionId,
        payer: UserId,
        currency: &str,
    ) -> Result<PaymentIntentHandle, GatewayError> {
        let currency = self.supported(currency)?;

        let gate = self.gate(session_id).await;
        let result = {
            let _turn = gate.lock().await;
            self.settle_exclusive(session_id, payer, currency).await
        };
        drop(gate);
        self.release(session_id).await;
        result
    }

    async fn settle_exclusive(
        &self,
        session_id: SessionId,
        payer: UserId,
        currency: Currency,
    ) -> Result<PaymentIntentHandle, GatewayError> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(GatewayError::SessionNotFound(session_id))?;
        if session.requester != payer {
            return Err(GatewayError::Forbidden(
                "only the requester can pay for this session".to_string(),
            ));
        }
        session.ensure_settleable()?;

        let request = CaptureRequest {
            session_id,
            amount_minor: session.amount_minor()?,
            currency,
        };
        let outcome = self.capture(&request).await?;

        let committed = self.commit_paid(session_id, &request, &outcome).await;
        let (session, transaction, balance) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                tracing::warn!(
                    %session_id,
                    reference = %outcome.reference,
                    error = %e,
                    "capture succeeded without a local settlement record"
                );
                return Err(e);
            }
        };

        tracing::info!(
            %session_id,
            transaction_id = %transaction.id,
            provider = %session.provider,
            balance,
            "session paid"
        );

        let requester_name = self
            .catalog
            .user(session.requester)
            .await
            .ok()
            .flatten()
            .map_or_else(|| "A user".to_string(), |u| u.full_name);
        let notification = Notification::about(
            session.provider,
            session.id,
            "Booking Session Payment Received",
            format!(
                "{requester_name} has paid ${} for the booked session",
                session.total_price
            ),
        )
        .tagged(ActionType::PaymentReceived);
        deliver(self.notifier.as_ref(), notification, None).await;

        Ok(PaymentIntentHandle {
            session_id,
            transaction_id: transaction.id,
            client_secret: transaction.payment_reference,
            publishable_key: self.config.publishable_key.clone(),
            amount_minor: transaction.amount_minor,
            currency: transaction.currency,
        })
    }

    /// The provider's balance and settlements, optionally limited to
    /// capture dates within `[from, to]`.
    ///
    /// The wallet also carries the provider's review count and average
    /// rating.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UserNotFound`], a validation error for an
    /// inverted range, and persistence failures.
    pub async fn wallet(
        &self,
        provider: UserId,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Wallet, GatewayError> {
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(GatewayError::validation(
                "start_date",
                "start date is after end date",
            ));
        }
        let profile = self
            .catalog
            .user(provider)
            .await?
            .ok_or(GatewayError::UserNotFound(*provider.as_uuid()))?;
        let settlements = self
            .store
            .settlements_for_provider(provider, from, to)
            .await?;
        let reviews = self.store.reviews_for(provider).await?;
        Ok(Wallet {
            total_earnings: profile.balance,
            settlements,
            review_count: reviews.len(),
            average_rating: average_rating(&reviews),
        })
    }

    /// Per-session lock shared by every concurrent settle of that session.
    async fn gate(&self, session_id: SessionId) -> Arc<Mutex<()>> {
        let mut gates = self.in_flight.lock().await;
        Arc::clone(gates.entry(session_id).or_default())
    }

    /// Drops the session's lock once no caller holds or awaits it.
    async fn release(&self, session_id: SessionId) {
        let mut gates = self.in_flight.lock().await;
        if gates
            .get(&session_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&session_id);
        }
    }

    fn supported(&self, raw: &str) -> Result<Currency, GatewayError> {
        let currency = Currency::parse(raw)?;
        if !self.config.supported_currencies.contains(&currency) {
            return Err(GatewayError::validation(
                "currency",
                format!("unsupported currency {currency}"),
            ));
        }
        Ok(currency)
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureOutcome, GatewayError> {
        let session_id = request.session_id;
        match tokio::time::timeout(self.config.capture_timeout, self.processor.capture(request))
            .await
        {
            Ok(Ok(outcome)) if outcome.success => Ok(outcome),
            Ok(Ok(outcome)) => {
                tracing::error!(%session_id, reference = %outcome.reference, "capture declined");
                Err(GatewayError::SettlementFailed)
            }
            Ok(Err(e)) => {
                tracing::error!(%session_id, error = %e, "capture failed");
                Err(GatewayError::SettlementFailed)
            }
            Err(_) => {
                tracing::error!(
                    %session_id,
                    timeout_ms = self.config.capture_timeout.as_millis(),
                    "capture timed out"
                );
                Err(GatewayError::SettlementFailed)
            }
        }
    }

    async fn commit_paid(
        &self,
        session_id: SessionId,
        request: &CaptureRequest,
        outcome: &CaptureOutcome,
    ) -> Result<(BookingSession, Transaction, i64), GatewayError> {
        let mut uow = self.store.begin().await?;
        let mut session = uow
            .lock_session(session_id)
            .await?
            .ok_or(GatewayError::SessionNotFound(session_id))?;
        session.mark_paid()?;

        let transaction = Transaction {
            id: TransactionId::new(),
            session_id,
            currency: request.currency.clone(),
            amount_minor: request.amount_minor,
            payment_reference: outcome.reference.clone(),
            captured_at: Utc::now(),
        };
        uow.insert_transaction(&transaction).await?;
        uow.update_session(&session).await?;
        let balance = uow
            .credit_balance(session.provider, session.total_price)
            .await?;
        uow.commit().await?;
        Ok((session, transaction, balance))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Decision, Dispatch, ReviewSubmission, SessionStatus};
    use crate::service::session_service::ProposalRequest;
    use crate::service::test_support::{Fixture, ScriptedProcessor, at, tuesday};
    use tokio::task::JoinSet;

    async fn accepted(fx: &Fixture) -> BookingSession {
        let Ok(session) = fx
            .sessions
            .propose(ProposalRequest {
                requester: fx.requester,
                provider: fx.provider,
                requested_date: tuesday(),
                start_timestamp: at(tuesday(), 9),
                service_ids: vec![fx.cut, fx.colour],
            })
            .await
        else {
            panic!("proposal failed");
        };
        let Ok(session) = fx
            .sessions
            .resolve(session.id, fx.provider, Decision::Accept { duration_hours: 1 })
            .await
        else {
            panic!("accept failed");
        };
        session
    }

    #[tokio::test]
    async fn settle_marks_paid_and_credits_provider() {
        let fx = Fixture::new(ScriptedProcessor::approving()).await;
        let session = accepted(&fx).await;
        let mut rx = fx.bus.subscribe();

        let Ok(handle) = fx.settlement.settle(session.id, fx.requester, "USD").await else {
            panic!("settle failed");
        };
        assert_eq!(handle.amount_minor, 5000);
        assert_eq!(handle.currency.as_str(), "usd");
        assert_eq!(handle.publishable_key, "pk_test");
        assert!(handle.client_secret.starts_with("pi_test_"));

        let Ok(stored) = fx.sessions.get_session(session.id).await else {
            panic!("session missing");
        };
        assert_eq!(stored.status, SessionStatus::Paid);
        assert_eq!(fx.store.balance(fx.provider).await, Some(50));
        assert_eq!(fx.store.transaction_count(session.id).await, 1);

        let Ok(Dispatch::Notification(n)) = rx.recv().await else {
            panic!("expected a notification");
        };
        assert_eq!(n.recipient, fx.provider);
        assert_eq!(n.action_type, Some(ActionType::PaymentReceived));
        assert!(!n.actionable);
    }

    #[tokio::test]
    async fn second_settle_fails_before_processor_call() {
        let fx = Fixture::new(ScriptedProcessor::approving()).await;
        let session = accepted(&fx).await;
        assert!(fx.settlement.settle(session.id, fx.requester, "usd").await.is_ok());
        assert_eq!(fx.processor.calls(), 1);

        let again = fx.settlement.settle(session.id, fx.requester, "usd").await;
        assert!(matches!(again, Err(GatewayError::AlreadySettled(_))));
        assert_eq!(fx.processor.calls(), 1);
        assert_eq!(fx.store.balance(fx.provider).await, Some(50));
    }

    #[tokio::test]
    async fn concurrent_settles_capture_and_credit_once() {
        let fx = Fixture::new(ScriptedProcessor::stalled(Duration::from_millis(50))).await;
        let session = accepted(&fx).await;

        let mut set = JoinSet::new();
        for _ in 0..8 {
            let settlement = Arc::clone(&fx.settlement);
            let requester = fx.requester;
            set.spawn(async move { settlement.settle(session.id, requester, "usd").await });
        }
        let mut ok = 0;
        while let Some(joined) = set.join_next().await {
            let Ok(result) = joined else {
                panic!("task panicked");
            };
            match result {
                Ok(_) => ok += 1,
                Err(e) => assert!(matches!(e, GatewayError::AlreadySettled(_)), "{e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(fx.processor.calls(), 1);
        assert_eq!(fx.store.transaction_count(session.id).await, 1);
        assert_eq!(fx.store.balance(fx.provider).await, Some(50));
        assert!(fx.settlement.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn declined_settle_can_be_retried() {
        let fx = Fixture::new(ScriptedProcessor::declining()).await;
        let session = accepted(&fx).await;
        for _ in 0..2 {
            let result = fx.settlement.settle(session.id, fx.requester, "usd").await;
            assert!(matches!(result, Err(GatewayError::SettlementFailed)));
        }
        assert_eq!(fx.processor.calls(), 2);
        assert!(fx.settlement.in_flight.lock().await.is_empty());
    }

    #[tokio::test]
    async fn balance_matches_paid_sessions_across_concurrent_settles() {
        let fx = Fixture::new(ScriptedProcessor::approving()).await;
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(accepted(&fx).await.id);
        }

        let mut set = JoinSet::new();
        for id in ids.clone() {
            let settlement = Arc::clone(&fx.settlement);
            let requester = fx.requester;
            set.spawn(async move { settlement.settle(id, requester, "usd").await });
        }
        while let Some(joined) = set.join_next().await {
            assert!(matches!(joined, Ok(Ok(_))));
        }
        assert_eq!(fx.store.balance(fx.provider).await, Some(250));

        let Ok(wallet) = fx.settlement.wallet(fx.provider, None, None).await else {
            panic!("wallet failed");
        };
        assert_eq!(wallet.total_earnings, 250);
        assert_eq!(wallet.settlements.len(), ids.len());
    }

    async fn assert_untouched(fx: &Fixture, session: &BookingSession) {
        let Ok(stored) = fx.sessions.get_session(session.id).await else {
            panic!("session missing");
        };
        assert_eq!(stored.status, SessionStatus::Accepted);
        assert_eq!(fx.store.transaction_count(session.id).await, 0);
        assert_eq!(fx.store.balance(fx.provider).await, Some(0));
    }

    #[tokio::test]
    async fn declined_capture_leaves_no_trace() {
        let fx = Fixture::new(ScriptedProcessor::declining()).await;
        let session = accepted(&fx).await;
        let result = fx.settlement.settle(session.id, fx.requester, "usd").await;
        assert!(matches!(result, Err(GatewayError::SettlementFailed)));
        assert_untouched(&fx, &session).await;
    }

    #[tokio::test]
    async fn processor_error_leaves_no_trace() {
        let fx = Fixture::new(ScriptedProcessor::unreachable()).await;
        let session = accepted(&fx).await;
        let result = fx.settlement.settle(session.id, fx.requester, "usd").await;
        assert!(matches!(result, Err(GatewayError::SettlementFailed)));
        assert_untouched(&fx, &session).await;
    }

    #[tokio::test]
    async fn stalled_capture_times_out() {
        let fx = Fixture::new(ScriptedProcessor::stalled(Duration::from_secs(5))).await;
        let session = accepted(&fx).await;
        let result = fx.settlement.settle(session.id, fx.requester, "usd").await;
        assert!(matches!(result, Err(GatewayError::SettlementFailed)));
        assert_untouched(&fx, &session).await;
    }

    #[tokio::test]
    async fn settle_requires_accepted_session_and_requester() {
        let fx = Fixture::new(ScriptedProcessor::approving()).await;
        let session = accepted(&fx).await;

        let wrong_payer = fx.settlement.settle(session.id, fx.provider, "usd").await;
        assert!(matches!(wrong_payer, Err(GatewayError::Forbidden(_))));

        let unsupported = fx.settlement.settle(session.id, fx.requester, "jpy").await;
        assert!(matches!(unsupported, Err(GatewayError::Validation { field: "currency", .. })));

        let missing = fx.settlement.settle(SessionId::new(), fx.requester, "usd").await;
        assert!(matches!(missing, Err(GatewayError::SessionNotFound(_))));

        let Ok(proposed) = fx
            .sessions
            .propose(ProposalRequest {
                requester: fx.requester,
                provider: fx.provider,
                requested_date: tuesday(),
                start_timestamp: at(tuesday(), 15),
                service_ids: vec![fx.cut],
            })
            .await
        else {
            panic!("proposal failed");
        };
        let early = fx.settlement.settle(proposed.id, fx.requester, "usd").await;
        assert!(matches!(
            early,
            Err(GatewayError::IllegalTransition {
                from: SessionStatus::Proposed,
                to: SessionStatus::Paid
            })
        ));
        assert_eq!(fx.processor.calls(), 0);
    }

    #[tokio::test]
    async fn wallet_reports_reviews_received() {
        let fx = Fixture::new(ScriptedProcessor::approving()).await;
        let first = accepted(&fx).await;
        let second = accepted(&fx).await;
        for (session, rating) in [(&first, 5), (&second, 4)] {
            assert!(fx.settlement.settle(session.id, fx.requester, "usd").await.is_ok());
            let Ok(review) = ReviewSubmission::new(rating, None) else {
                panic!("valid review");
            };
            let completed = fx.sessions.complete(session.id, fx.requester, review).await;
            assert!(completed.is_ok());
        }

        let Ok(wallet) = fx.settlement.wallet(fx.provider, None, None).await else {
            panic!("wallet failed");
        };
        assert_eq!(wallet.total_earnings, 100);
        assert_eq!(wallet.review_count, 2);
        assert!((wallet.average_rating - 4.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn wallet_rejects_inverted_range() {
        let fx = Fixture::new(ScriptedProcessor::approving()).await;
        let day = tuesday();
        let result = fx
            .settlement
            .wallet(fx.provider, day.succ_opt(), Some(day))
            .await;
        assert!(matches!(result, Err(GatewayError::Validation { .. })));
    }
}
