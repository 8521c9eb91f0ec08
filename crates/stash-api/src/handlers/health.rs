//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub cache_enabled: bool,
    pub registered_fetchers: usize,
}

/// Always ready: a missing or unreachable store only means uncached serving.
pub async fn ready(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ReadyResponse>) {
    (
        StatusCode::OK,
        Json(ReadyResponse {
            cache_enabled: state.store.is_enabled(),
            registered_fetchers: state.scheduler.registry().len(),
        }),
    )
}
