//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the cache core and its adapters:
//! storage backends on one side, provider fetchers on the other.

use crate::entry::{CacheEntry, Dimensions, EndpointStats, GlobalStats, UpsertRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable storage for cache entries.
///
/// Implementations report failures as errors; the `CacheStore` facade decides
/// how to degrade. Every timestamp comparison uses the `now` passed in.
#[async_trait]
pub trait CacheRepository: Send + Sync {
    /// Get an entry only if `now < expires_at`.
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>>;

    /// Record a read: bump `fetch_count`, set `last_accessed_at`.
    async fn touch(&self, key: &str, now: DateTime<Utc>) -> Result<()>;

    /// Insert, or on key conflict overwrite and bump `refresh_count`.
    async fn upsert(&self, record: &UpsertRecord) -> Result<()>;

    /// Expired entries, most-requested first, then soonest-expired.
    async fn list_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<CacheEntry>>;

    /// Every entry ordered by provider, endpoint, category.
    async fn list_all(&self) -> Result<Vec<CacheEntry>>;

    /// Every entry for one provider, in `list_all` order.
    async fn list_by_provider(&self, provider: &str) -> Result<Vec<CacheEntry>>;

    /// Delete rows last accessed before `cutoff`.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Per provider/endpoint aggregates plus a global roll-up.
    async fn stats(&self, now: DateTime<Utc>) -> Result<(Vec<EndpointStats>, GlobalStats)>;

    /// Delete one entry.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Delete every entry.
    async fn clear_all(&self) -> Result<u64>;

    /// Connection pool state, for backends that have one.
    fn pool_stats(&self) -> Option<PoolStats> {
        None
    }
}

/// Snapshot of a backend's connection pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_connections: u32,
}

/// Produces a fresh payload for one provider/endpoint pair.
///
/// Fetchers must fail with a classified error and must not cache.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, dimensions: &Dimensions) -> Result<Value>;
}
