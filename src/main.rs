//! wafina-gateway server entry point.
//!
//! Starts the Axum HTTP server with the REST endpoints and the
//! notification log drain.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use wafina_gateway::api;
use wafina_gateway::app_state::AppState;
use wafina_gateway::config::{GatewayConfig, LogFormat};
use wafina_gateway::domain::{Dispatch, EventBus};
use wafina_gateway::persistence::{BookingStore, CatalogSource, MemoryStore, PostgresStore};
use wafina_gateway::service::SandboxProcessor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting wafina-gateway");

    // Build persistence layer
    let (store, catalog): (Arc<dyn BookingStore>, Arc<dyn CatalogSource>) =
        if config.persistence_enabled {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
                .connect(&config.database_url)
                .await
                .context("connecting to PostgreSQL")?;
            let store = Arc::new(PostgresStore::new(pool));
            store.migrate().await.context("applying migrations")?;
            tracing::info!("using PostgreSQL persistence");
            (Arc::clone(&store) as Arc<dyn BookingStore>, store as Arc<dyn CatalogSource>)
        } else {
            let store = Arc::new(MemoryStore::new());
            tracing::warn!("persistence disabled, using the in-memory store");
            (Arc::clone(&store) as Arc<dyn BookingStore>, store as Arc<dyn CatalogSource>)
        };

    // Notification sink and its log drain
    let event_bus = EventBus::new(config.event_bus_capacity);
    tokio::spawn(drain_notifications(event_bus.subscribe()));

    // Build application state
    let app_state = AppState::new(
        store,
        catalog,
        Arc::new(SandboxProcessor::new()),
        event_bus,
        config.settlement(),
    );

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.request_timeout_secs,
                ))),
        )
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    Ok(())
}

/// Logs every dispatched notification and e-mail until the bus closes.
async fn drain_notifications(mut rx: broadcast::Receiver<Dispatch>) {
    loop {
        match rx.recv().await {
            Ok(Dispatch::Notification(n)) => tracing::info!(
                recipient = %n.recipient,
                subject = %n.subject,
                actionable = n.actionable,
                "notification"
            ),
            Ok(Dispatch::Email(e)) => tracing::info!(
                to = %e.to,
                template = e.template.template_name(),
                "email"
            ),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "notification drain lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
