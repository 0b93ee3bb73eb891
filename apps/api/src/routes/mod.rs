pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::extraction::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profiles API
        .route("/api/v1/profiles/extract", post(handlers::handle_extract))
        .route("/api/v1/profiles/migrate", post(handlers::handle_migrate))
        .route("/api/v1/profiles/skeleton", get(handlers::handle_skeleton))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()) // TODO: tighten CORS in production
}
