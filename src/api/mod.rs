//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`; `/health` and the
//! `/ws` change feed live at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Requests taking longer than this are answered with 408.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "bunny-happiness",
        description = "Happiness accounting for virtual pet bunnies: event ledger, points table and recalculation."
    ),
    paths(
        handlers::bunny::create_bunny,
        handlers::bunny::list_bunnies,
        handlers::bunny::get_bunny,
        handlers::bunny::update_bunny,
        handlers::bunny::bunny_events,
        handlers::activity::feed,
        handlers::activity::play,
        handlers::activity::recalculate_one,
        handlers::activity::recalculate_all,
        handlers::config::get_points,
        handlers::config::update_points,
        handlers::config::reset_points,
        handlers::config::preview_points,
        handlers::system::health_handler,
        handlers::system::stats_handler,
    ),
    components(schemas(crate::error::ErrorResponse, crate::error::ErrorBody)),
    tags(
        (name = "Bunnies", description = "Bunny registry"),
        (name = "Activities", description = "Feeding, playing and recalculation"),
        (name = "Points", description = "Points table and impact preview"),
        (name = "System", description = "Health and dashboard"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the full application: REST routes, the `/ws` feed and the HTTP
/// middleware stack, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
