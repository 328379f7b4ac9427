//! Bunny handlers: create, list, get, edit, history.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BunnyEventsResponse, BunnyListResponse, BunnyResponse, CreateBunnyRequest, PaginationParams,
    UpdateBunnyRequest,
};
use crate::app_state::AppState;
use crate::domain::BunnyId;
use crate::error::{ErrorResponse, HappinessError};

/// `POST /bunnies` — Register a bunny.
///
/// # Errors
///
/// Returns [`HappinessError::Validation`] on an invalid name, avatar URL or
/// starting happiness.
#[utoipa::path(
    post,
    path = "/api/v1/bunnies",
    tag = "Bunnies",
    summary = "Register a bunny",
    description = "Creates a bunny with a validated name, optional avatar URL and starting happiness (default 50).",
    request_body = CreateBunnyRequest,
    responses(
        (status = 201, description = "Bunny created", body = BunnyResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn create_bunny(
    State(state): State<AppState>,
    Json(req): Json<CreateBunnyRequest>,
) -> Result<impl IntoResponse, HappinessError> {
    let new = req.into_new_bunny()?;
    let bunny = state.service.add_bunny(new).await?;
    Ok((StatusCode::CREATED, Json(BunnyResponse::from(bunny))))
}

/// `GET /bunnies` — List bunnies with pagination.
///
/// # Errors
///
/// Returns [`HappinessError::Storage`] on backend failure.
#[utoipa::path(
    get,
    path = "/api/v1/bunnies",
    tag = "Bunnies",
    summary = "List bunnies",
    description = "Returns a paginated list of bunnies, oldest first.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated bunny list", body = BunnyListResponse),
    )
)]
pub async fn list_bunnies(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, HappinessError> {
    let bunnies = state.service.list_bunnies().await?;
    let (page, pagination) = params.paginate(bunnies);
    Ok(Json(BunnyListResponse {
        data: page.into_iter().map(BunnyResponse::from).collect(),
        pagination,
    }))
}

/// `GET /bunnies/{id}` — Get one bunny.
///
/// # Errors
///
/// Returns [`HappinessError::BunnyNotFound`] if the bunny does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/bunnies/{id}",
    tag = "Bunnies",
    summary = "Get a bunny",
    params(
        ("id" = uuid::Uuid, Path, description = "Bunny UUID"),
    ),
    responses(
        (status = 200, description = "Bunny details", body = BunnyResponse),
        (status = 404, description = "Bunny not found", body = ErrorResponse),
    )
)]
pub async fn get_bunny(
    State(state): State<AppState>,
    Path(id): Path<BunnyId>,
) -> Result<impl IntoResponse, HappinessError> {
    let bunny = state.service.get_bunny(id).await?;
    Ok(Json(BunnyResponse::from(bunny)))
}

/// `PATCH /bunnies/{id}` — Edit name or avatar.
///
/// # Errors
///
/// Returns [`HappinessError::Validation`] on invalid fields or
/// [`HappinessError::BunnyNotFound`] if the bunny does not exist.
#[utoipa::path(
    patch,
    path = "/api/v1/bunnies/{id}",
    tag = "Bunnies",
    summary = "Edit a bunny",
    description = "Changes the name and/or avatar. Happiness cannot be edited directly.",
    params(
        ("id" = uuid::Uuid, Path, description = "Bunny UUID"),
    ),
    request_body = UpdateBunnyRequest,
    responses(
        (status = 200, description = "Updated bunny", body = BunnyResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Bunny not found", body = ErrorResponse),
    )
)]
pub async fn update_bunny(
    State(state): State<AppState>,
    Path(id): Path<BunnyId>,
    Json(req): Json<UpdateBunnyRequest>,
) -> Result<impl IntoResponse, HappinessError> {
    let update = req.into_update()?;
    let bunny = state.service.update_bunny(id, &update).await?;
    Ok(Json(BunnyResponse::from(bunny)))
}

/// `GET /bunnies/{id}/events` — Ledger history of one bunny.
///
/// # Errors
///
/// Returns [`HappinessError::BunnyNotFound`] if the bunny does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/bunnies/{id}/events",
    tag = "Bunnies",
    summary = "List a bunny's events",
    description = "Returns every eating and playing event the bunny took part in, as actor or playmate, oldest first.",
    params(
        ("id" = uuid::Uuid, Path, description = "Bunny UUID"),
    ),
    responses(
        (status = 200, description = "Event history", body = BunnyEventsResponse),
        (status = 404, description = "Bunny not found", body = ErrorResponse),
    )
)]
pub async fn bunny_events(
    State(state): State<AppState>,
    Path(id): Path<BunnyId>,
) -> Result<impl IntoResponse, HappinessError> {
    let events = state.service.bunny_events(id).await?;
    Ok(Json(BunnyEventsResponse {
        bunny_id: id,
        events,
    }))
}

/// Bunny routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bunnies", post(create_bunny).get(list_bunnies))
        .route("/bunnies/{id}", get(get_bunny).patch(update_bunny))
        .route("/bunnies/{id}/events", get(bunny_events))
}
