//! System endpoints: health check and dashboard stats.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::error::HappinessError;
use crate::service::DashboardStats;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /stats` — Dashboard headline numbers.
///
/// # Errors
///
/// Returns [`HappinessError::Storage`] on backend failure.
#[utoipa::path(
    get,
    path = "/api/v1/stats",
    tag = "System",
    summary = "Dashboard stats",
    description = "Average happiness (one decimal), bunny count and events recorded today (UTC).",
    responses(
        (status = 200, description = "Dashboard stats", body = DashboardStats),
    )
)]
pub async fn stats_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HappinessError> {
    Ok(Json(state.service.stats().await?))
}

/// Routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

/// Stats route, mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/stats", get(stats_handler))
}
