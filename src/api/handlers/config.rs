//! Points-table handlers: read, replace, reset and preview.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::domain::{PointsConfig, PointsConfigInput};
use crate::error::{ErrorResponse, HappinessError};
use crate::service::{ConfigUpdate, ImpactReport};

/// `GET /config/points` — Current points table.
///
/// # Errors
///
/// Returns [`HappinessError::Storage`] on backend failure.
#[utoipa::path(
    get,
    path = "/api/v1/config/points",
    tag = "Points",
    summary = "Get the points table",
    responses(
        (status = 200, description = "Current points table", body = PointsConfig),
    )
)]
pub async fn get_points(State(state): State<AppState>) -> Result<impl IntoResponse, HappinessError> {
    Ok(Json(state.service.current_config().await?))
}

/// `PUT /config/points` — Replace the points table and recalculate.
///
/// # Errors
///
/// Returns [`HappinessError::Validation`] if any weight is negative,
/// fractional or too large.
#[utoipa::path(
    put,
    path = "/api/v1/config/points",
    tag = "Points",
    summary = "Replace the points table",
    description = "Stores the new weights and recalculates every bunny before responding.",
    request_body = PointsConfigInput,
    responses(
        (status = 200, description = "Stored table and recalculation report", body = ConfigUpdate),
        (status = 400, description = "Invalid weights", body = ErrorResponse),
    )
)]
pub async fn update_points(
    State(state): State<AppState>,
    Json(input): Json<PointsConfigInput>,
) -> Result<impl IntoResponse, HappinessError> {
    Ok(Json(state.service.update_config(input).await?))
}

/// `POST /config/points/reset` — Restore the default points table.
///
/// # Errors
///
/// Returns [`HappinessError::Storage`] on backend failure.
#[utoipa::path(
    post,
    path = "/api/v1/config/points/reset",
    tag = "Points",
    summary = "Reset the points table",
    description = "Restores the default weights and recalculates every bunny.",
    responses(
        (status = 200, description = "Stored table and recalculation report", body = ConfigUpdate),
    )
)]
pub async fn reset_points(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HappinessError> {
    Ok(Json(state.service.reset_config().await?))
}

/// `POST /config/points/preview` — Dry-run a candidate points table.
///
/// # Errors
///
/// Returns [`HappinessError::Validation`] if the candidate is invalid.
#[utoipa::path(
    post,
    path = "/api/v1/config/points/preview",
    tag = "Points",
    summary = "Preview a points table",
    description = "Reports which bunnies would change under the candidate weights, without writing anything.",
    request_body = PointsConfigInput,
    responses(
        (status = 200, description = "Impact report", body = ImpactReport),
        (status = 400, description = "Invalid weights", body = ErrorResponse),
    )
)]
pub async fn preview_points(
    State(state): State<AppState>,
    Json(input): Json<PointsConfigInput>,
) -> Result<impl IntoResponse, HappinessError> {
    let candidate = PointsConfig::try_from(input)?;
    Ok(Json(state.service.preview_impact(&candidate).await?))
}

/// Points-table routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/config/points", get(get_points).put(update_points))
        .route("/config/points/reset", post(reset_points))
        .route("/config/points/preview", post(preview_points))
}
