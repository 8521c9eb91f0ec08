//! Cache administration handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stash_core::ports::PoolStats;
use stash_core::{CacheEntry, CacheStats, Clock};
use stash_fetch::TargetCounters;
use stash_scheduler::SweepSummary;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn require_enabled(state: &AppState) -> Result<(), (StatusCode, String)> {
    if state.store.is_enabled() {
        Ok(())
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Cache is disabled".to_string(),
        ))
    }
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    pub pool: Option<PoolStats>,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.store.stats().await,
        pool: state.store.pool_stats(),
    })
}

pub async fn upstreams(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, TargetCounters>> {
    Json(state.upstreams.snapshot())
}

pub async fn refresh_provider(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
) -> ApiResult<SweepSummary> {
    require_enabled(&state)?;
    info!(provider = %provider, "Manual provider refresh requested");
    Ok(Json(state.scheduler.refresh_provider(&provider).await))
}

#[derive(Deserialize)]
pub struct RefreshParams {
    pub batch_size: Option<u32>,
}

pub async fn refresh_expired(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshParams>,
) -> ApiResult<SweepSummary> {
    require_enabled(&state)?;
    if params.batch_size == Some(0) {
        return Err((
            StatusCode::BAD_REQUEST,
            "batch_size must be positive".to_string(),
        ));
    }
    info!(batch_size = ?params.batch_size, "Manual expired refresh requested");
    Ok(Json(state.scheduler.refresh_expired(params.batch_size).await))
}

pub async fn refresh_all(State(state): State<Arc<AppState>>) -> ApiResult<SweepSummary> {
    require_enabled(&state)?;
    info!("Manual full refresh requested");
    Ok(Json(state.scheduler.refresh_all().await))
}

#[derive(Deserialize)]
pub struct PurgeParams {
    pub days: Option<u32>,
}

pub async fn purge(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PurgeParams>,
) -> ApiResult<SweepSummary> {
    require_enabled(&state)?;
    Ok(Json(state.scheduler.purge(params.days).await))
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub removed: u64,
}

pub async fn clear(State(state): State<Arc<AppState>>) -> ApiResult<ClearResponse> {
    require_enabled(&state)?;
    let removed = state.store.clear_all().await;
    Ok(Json(ClearResponse { removed }))
}

#[derive(Deserialize)]
pub struct ListParams {
    pub provider: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

/// Entry metadata without the payload.
#[derive(Serialize)]
pub struct EntryResponse {
    pub cache_key: String,
    pub provider: String,
    pub endpoint: String,
    pub category: Option<String>,
    pub period: Option<String>,
    pub result_count: i64,
    pub fetch_count: i64,
    pub refresh_count: i64,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expired: bool,
}

impl EntryResponse {
    fn from_entry(entry: CacheEntry, now: DateTime<Utc>) -> Self {
        Self {
            expired: !entry.is_valid_at(now),
            cache_key: entry.cache_key,
            provider: entry.provider,
            endpoint: entry.endpoint,
            category: entry.category,
            period: entry.period,
            result_count: entry.result_count,
            fetch_count: entry.fetch_count,
            refresh_count: entry.refresh_count,
            updated_at: entry.updated_at,
            expires_at: entry.expires_at,
            last_accessed_at: entry.last_accessed_at,
        }
    }
}

#[derive(Serialize)]
pub struct ListEntriesResponse {
    pub entries: Vec<EntryResponse>,
    pub total: usize,
}

pub async fn list_entries(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Json<ListEntriesResponse> {
    let entries = match &params.provider {
        Some(provider) => state.store.list_by_provider(provider).await,
        None => state.store.list_all().await,
    };
    let total = entries.len();
    let now = state.store.clock().now();

    let entries = entries
        .into_iter()
        .skip(params.offset)
        .take(params.limit)
        .map(|e| EntryResponse::from_entry(e, now))
        .collect();

    Json(ListEntriesResponse { entries, total })
}

pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    require_enabled(&state)?;
    if state.store.delete(&key).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("No cache entry {}", key)))
    }
}
