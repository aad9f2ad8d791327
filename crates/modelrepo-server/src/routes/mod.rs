//! API routes for the model repository server.

pub mod models;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::store::AppState;

/// Creates the main API router with all routes mounted.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(models::router(state))
        .layer(TraceLayer::new_for_http())
}
