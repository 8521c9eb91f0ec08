//! API route definitions.

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::handlers::{cache, health};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/cache", cache_routes())
}

fn cache_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stats", get(cache::stats))
        .route("/upstreams", get(cache::upstreams))
        .route("/refresh", post(cache::refresh_expired))
        .route("/refresh/{provider}", post(cache::refresh_provider))
        .route("/refresh-all", post(cache::refresh_all))
        .route("/purge", delete(cache::purge))
        .route("/clear", delete(cache::clear))
        .route("/entries", get(cache::list_entries))
        .route("/entries/{key}", delete(cache::delete_entry))
}
