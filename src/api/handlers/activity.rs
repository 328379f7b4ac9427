//! Activity handlers: feed, play and recalculation.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{FeedRequest, PlayRequest};
use crate::app_state::AppState;
use crate::domain::BunnyId;
use crate::error::{ErrorResponse, HappinessError};
use crate::service::{ActivityOutcome, BunnyRecalculation, RecalculationReport};

/// `POST /bunnies/{id}/feed` — Feed a bunny.
///
/// # Errors
///
/// Returns [`HappinessError::BunnyNotFound`] if the bunny does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/bunnies/{id}/feed",
    tag = "Activities",
    summary = "Feed a bunny",
    description = "Appends an eating event priced under the current points table and adds the points to the bunny's happiness (capped at 100).",
    params(
        ("id" = uuid::Uuid, Path, description = "Bunny UUID"),
    ),
    request_body = FeedRequest,
    responses(
        (status = 201, description = "Event recorded", body = ActivityOutcome),
        (status = 404, description = "Bunny not found", body = ErrorResponse),
    )
)]
pub async fn feed(
    State(state): State<AppState>,
    Path(id): Path<BunnyId>,
    Json(req): Json<FeedRequest>,
) -> Result<impl IntoResponse, HappinessError> {
    let outcome = state.service.feed(id, req.food_type).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /bunnies/{id}/play` — Two bunnies play together.
///
/// # Errors
///
/// Returns [`HappinessError::InvalidOperation`] on self-play or
/// [`HappinessError::BunnyNotFound`] if either bunny does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/bunnies/{id}/play",
    tag = "Activities",
    summary = "Record a play session",
    description = "Appends a playing event and adds the same points to both participants. The first play between a pair earns `playing`; later plays earn `repeat_playing`.",
    params(
        ("id" = uuid::Uuid, Path, description = "Initiating bunny UUID"),
    ),
    request_body = PlayRequest,
    responses(
        (status = 201, description = "Event recorded", body = ActivityOutcome),
        (status = 404, description = "Bunny not found", body = ErrorResponse),
        (status = 422, description = "Bunny cannot play with itself", body = ErrorResponse),
    )
)]
pub async fn play(
    State(state): State<AppState>,
    Path(id): Path<BunnyId>,
    Json(req): Json<PlayRequest>,
) -> Result<impl IntoResponse, HappinessError> {
    let outcome = state.service.play(id, req.playmate_bunny_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `POST /bunnies/{id}/recalculate` — Replay one bunny's history.
///
/// # Errors
///
/// Returns [`HappinessError::BunnyNotFound`] if the bunny does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/bunnies/{id}/recalculate",
    tag = "Activities",
    summary = "Recalculate one bunny",
    description = "Recomputes the bunny's happiness from its full event history under the current points table.",
    params(
        ("id" = uuid::Uuid, Path, description = "Bunny UUID"),
    ),
    responses(
        (status = 200, description = "Recalculated", body = BunnyRecalculation),
        (status = 404, description = "Bunny not found", body = ErrorResponse),
    )
)]
pub async fn recalculate_one(
    State(state): State<AppState>,
    Path(id): Path<BunnyId>,
) -> Result<impl IntoResponse, HappinessError> {
    let result = state.service.recalculate_one(id).await?;
    Ok(Json(result))
}

/// `POST /recalculate` — Replay every bunny.
///
/// # Errors
///
/// Returns [`HappinessError::Storage`] if the bunny list cannot be read.
/// Per-bunny failures are reported in the body.
#[utoipa::path(
    post,
    path = "/api/v1/recalculate",
    tag = "Activities",
    summary = "Recalculate all bunnies",
    responses(
        (status = 200, description = "Recalculation report", body = RecalculationReport),
    )
)]
pub async fn recalculate_all(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, HappinessError> {
    let report = state.service.recalculate_all().await?;
    Ok(Json(report))
}

/// Activity routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bunnies/{id}/feed", post(feed))
        .route("/bunnies/{id}/play", post(play))
        .route("/bunnies/{id}/recalculate", post(recalculate_one))
        .route("/recalculate", post(recalculate_all))
}
