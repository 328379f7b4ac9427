//! REST endpoint handlers organized by resource.

pub mod activity;
pub mod bunny;
pub mod config;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(bunny::routes())
        .merge(activity::routes())
        .merge(config::routes())
        .merge(system::api_routes())
}
