//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::HappinessService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Happiness service for all business logic.
    pub service: Arc<HappinessService>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
}

impl AppState {
    /// Wraps a service, sharing its event bus with the WebSocket layer.
    #[must_use]
    pub fn new(service: HappinessService) -> Self {
        let event_bus = service.event_bus().clone();
        Self {
            service: Arc::new(service),
            event_bus,
        }
    }
}
