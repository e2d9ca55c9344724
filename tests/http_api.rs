//! End-to-end tests of the REST surface against a live server backed by
//! the in-memory store and the sandbox payment processor.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Weekday;
use serde_json::{Value, json};

use wafina_gateway::api;
use wafina_gateway::app_state::AppState;
use wafina_gateway::domain::{CatalogEntry, Currency, EventBus, ServiceId, UserId, UserProfile};
use wafina_gateway::persistence::{BookingStore, CatalogSource, MemoryStore};
use wafina_gateway::service::{SandboxProcessor, SettlementConfig};

struct TestServer {
    base: String,
    client: reqwest::Client,
    store: MemoryStore,
    requester: UserId,
    provider: UserId,
    cut: ServiceId,
    colour: ServiceId,
}

impl TestServer {
    async fn start() -> Self {
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

        let Ok(usd) = Currency::parse("usd") else {
            panic!("valid currency");
        };
        let shared = Arc::new(store.clone());
        let state = AppState::new(
            Arc::clone(&shared) as Arc<dyn BookingStore>,
            shared as Arc<dyn CatalogSource>,
            Arc::new(SandboxProcessor::new()),
            EventBus::new(100),
            SettlementConfig {
                supported_currencies: vec![usd],
                capture_timeout: Duration::from_secs(5),
                publishable_key: "pk_test".to_string(),
            },
        );
        let app = api::build_router().with_state(state);

        let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
            panic!("bind failed");
        };
        let Ok(addr) = listener.local_addr() else {
            panic!("no local addr");
        };
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            store,
            requester,
            provider,
            cut,
            colour,
        }
    }

    async fn post(&self, path: &str, actor: Option<UserId>, body: Value) -> (u16, Value) {
        let mut request = self.client.post(format!("{}{path}", self.base)).json(&body);
        if let Some(actor) = actor {
            request = request.header("X-Actor-Id", actor.to_string());
        }
        Self::read(request.send().await).await
    }

    async fn get(&self, path: &str, actor: Option<UserId>) -> (u16, Value) {
        let mut request = self.client.get(format!("{}{path}", self.base));
        if let Some(actor) = actor {
            request = request.header("X-Actor-Id", actor.to_string());
        }
        Self::read(request.send().await).await
    }

    async fn read(response: reqwest::Result<reqwest::Response>) -> (u16, Value) {
        let Ok(response) = response else {
            panic!("request failed");
        };
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn propose(&self, date: &str, hour: &str) -> (u16, Value) {
        self.post(
            "/api/v1/sessions",
            Some(self.requester),
            json!({
                "target_id": self.provider,
                "requested_date": date,
                "start_time": format!("{date}T{hour}:00:00Z"),
                "requested_services": [self.cut, self.colour],
            }),
        )
        .await
    }
}

fn session_id(body: &Value) -> String {
    let Some(id) = body.get("session_id").and_then(Value::as_str) else {
        panic!("no session_id in {body}");
    };
    id.to_string()
}

fn error_code(body: &Value) -> Option<u64> {
    body.get("error")
        .and_then(|e| e.get("code"))
        .and_then(Value::as_u64)
}

#[tokio::test]
async fn full_session_lifecycle() {
    let server = TestServer::start().await;

    let (status, proposed) = server.propose("2030-01-08", "10").await;
    assert_eq!(status, 201, "{proposed}");
    assert_eq!(proposed.get("status"), Some(&json!("proposed")));
    assert_eq!(proposed.get("total_price"), Some(&json!(50)));
    assert_eq!(proposed.get("is_action_taken"), Some(&json!(false)));
    let id = session_id(&proposed);

    let (status, accepted) = server
        .post(
            &format!("/api/v1/sessions/{id}/action"),
            Some(server.provider),
            json!({"action": "accept", "duration_hours": 2}),
        )
        .await;
    assert_eq!(status, 200, "{accepted}");
    assert_eq!(accepted.get("payment"), Some(&json!("not_paid")));
    assert_eq!(
        accepted.get("end_time"),
        Some(&json!("2030-01-08T12:00:00Z"))
    );

    let (status, handle) = server
        .post(
            &format!("/api/v1/sessions/{id}/payment"),
            Some(server.requester),
            json!({"currency": "USD"}),
        )
        .await;
    assert_eq!(status, 200, "{handle}");
    assert_eq!(handle.get("currency"), Some(&json!("usd")));
    assert_eq!(handle.get("amount_minor"), Some(&json!(5000)));
    assert_eq!(handle.get("publishable_key"), Some(&json!("pk_test")));

    let (status, again) = server
        .post(
            &format!("/api/v1/sessions/{id}/payment"),
            Some(server.requester),
            json!({"currency": "usd"}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(error_code(&again), Some(2004));
    assert_eq!(server.store.balance(server.provider).await, Some(50));

    let (status, reviewed) = server
        .post(
            &format!("/api/v1/sessions/{id}/review"),
            Some(server.requester),
            json!({"rating": 5, "comments": "Lovely"}),
        )
        .await;
    assert_eq!(status, 201, "{reviewed}");
    let session = reviewed.get("session");
    assert_eq!(
        session.and_then(|s| s.get("status")),
        Some(&json!("completed"))
    );

    let (status, reviews) = server
        .get(&format!("/api/v1/users/{}/reviews", server.provider), None)
        .await;
    assert_eq!(status, 200);
    assert_eq!(reviews.get("count"), Some(&json!(1)));
    assert_eq!(reviews.get("average_rating"), Some(&json!(5.0)));

    let (status, wallet) = server.get("/api/v1/wallet", Some(server.provider)).await;
    assert_eq!(status, 200);
    assert_eq!(wallet.get("total_earnings"), Some(&json!(50)));
    assert_eq!(wallet.get("review_count"), Some(&json!(1)));
    assert_eq!(wallet.get("average_rating"), Some(&json!(5.0)));
    assert_eq!(
        wallet
            .get("transactions")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(1)
    );

    let (status, calendar) = server
        .get(
            "/api/v1/calendar?start_date=2030-01-08&end_date=2030-01-08",
            Some(server.provider),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(calendar.get("dates"), Some(&json!(["2030-01-08"])));
}

#[tokio::test]
async fn requests_without_actor_are_unauthorized() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/api/v1/wallet", None).await;
    assert_eq!(status, 401);
    assert_eq!(error_code(&body), Some(1002));
}

#[tokio::test]
async fn off_day_and_bad_input_are_reported() {
    let server = TestServer::start().await;

    let (status, body) = server.propose("2030-01-07", "10").await;
    assert_eq!(status, 422);
    assert_eq!(error_code(&body), Some(4001));

    let (status, body) = server
        .post(
            "/api/v1/sessions",
            Some(server.requester),
            json!({
                "target_id": server.provider,
                "requested_date": "2030-01-08",
                "start_time": "2030-01-08T10:00:00Z",
                "requested_services": [],
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(
        body.get("error").and_then(|e| e.get("details")),
        Some(&json!("requested_services"))
    );

    let (status, _) = server
        .get(
            "/api/v1/calendar?start_date=2030-01-09&end_date=2030-01-08",
            Some(server.provider),
        )
        .await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn second_decision_conflicts() {
    let server = TestServer::start().await;
    let (_, proposed) = server.propose("2030-01-08", "09").await;
    let id = session_id(&proposed);
    let path = format!("/api/v1/sessions/{id}/action");

    let (status, _) = server
        .post(&path, Some(server.provider), json!({"action": "reject"}))
        .await;
    assert_eq!(status, 200);

    let (status, body) = server
        .post(
            &path,
            Some(server.provider),
            json!({"action": "accept", "duration_hours": 1}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(error_code(&body), Some(2003));

    let (status, _) = server
        .post(&path, Some(server.requester), json!({"action": "reject"}))
        .await;
    assert_eq!(status, 403);
}

#[tokio::test]
async fn review_before_payment_is_rejected() {
    let server = TestServer::start().await;
    let (_, proposed) = server.propose("2030-01-08", "14").await;
    let id = session_id(&proposed);

    let (status, body) = server
        .post(
            &format!("/api/v1/sessions/{id}/review"),
            Some(server.requester),
            json!({"rating": 9}),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(error_code(&body), Some(1001));

    let (status, body) = server
        .post(
            &format!("/api/v1/sessions/{id}/review"),
            Some(server.requester),
            json!({"rating": 4}),
        )
        .await;
    assert_eq!(status, 409);
    assert_eq!(error_code(&body), Some(2005));
}

#[tokio::test]
async fn health_reports_status() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/health", None).await;
    assert_eq!(status, 200);
    assert_eq!(body.get("status"), Some(&json!("healthy")));
}
