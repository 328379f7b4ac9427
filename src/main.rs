//! bunny-happiness server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use bunny_happiness::api;
use bunny_happiness::app_state::AppState;
use bunny_happiness::config::{LogFormat, ServiceConfig};
use bunny_happiness::domain::EventBus;
use bunny_happiness::persistence::{PostgresStore, Storage};
use bunny_happiness::service::HappinessService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ServiceConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting bunny-happiness");

    // Build persistence layer
    let storage = if config.persistence_enabled {
        let store = PostgresStore::connect(&config).await?;
        Storage::from_transactional_backend(Arc::new(store))
    } else {
        tracing::info!("persistence disabled, using in-memory storage");
        Storage::in_memory()
    };

    // Build service layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let service = HappinessService::new(storage, event_bus)
        .with_event_policy(config.event_policy)
        .with_default_points(config.default_points);
    let points = service.current_config().await?;
    tracing::info!(?points, policy = ?config.event_policy, "points table loaded");

    // Build router
    let app = api::build_app(AppState::new(service));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
