//! Cache store facade.

use crate::keys::build_key;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use stash_core::ports::{CacheRepository, PoolStats};
use stash_core::{
    CacheEntry, CacheStats, Clock, Dimensions, Envelope, Error, SystemClock, UpsertRecord,
    result_count,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Entry point for every cache read and write.
///
/// Backend failures are logged and mapped to "absent", `false`, zero or an
/// empty list. A store built with [`CacheStore::disabled`] has no backend and
/// does nothing.
#[derive(Clone)]
pub struct CacheStore {
    repository: Option<Arc<dyn CacheRepository>>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(repository: Arc<dyn CacheRepository>) -> Self {
        Self::with_clock(repository, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<dyn CacheRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository: Some(repository),
            clock,
        }
    }

    pub fn disabled() -> Self {
        Self {
            repository: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.repository.is_some()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Payload for `key` if present and unexpired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.get_entry(key).await.map(|entry| entry.payload)
    }

    /// Like [`get`](Self::get) but returns the whole row.
    ///
    /// A hit schedules a detached update of the read counters. Its outcome
    /// never reaches the caller.
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let repository = self.repository.as_ref()?;
        let now = self.clock.now();

        let entry = match repository.get(key, now).await {
            Ok(entry) => entry?,
            Err(e) => {
                degraded("get", &e);
                return None;
            }
        };

        let repository = Arc::clone(repository);
        let touched = key.to_string();
        tokio::spawn(async move {
            if let Err(e) = repository.touch(&touched, now).await {
                debug!(cache_key = %touched, error = %e, "Failed to record cache read");
            }
        });

        Some(entry)
    }

    /// Write `payload` under `key`, expiring `ttl_seconds` from now.
    ///
    /// Returns `false` if the store is disabled or the write failed.
    pub async fn upsert(
        &self,
        key: &str,
        provider: &str,
        endpoint: &str,
        dimensions: &Dimensions,
        payload: Value,
        ttl_seconds: u64,
    ) -> bool {
        let Some(repository) = self.repository.as_ref() else {
            return false;
        };

        let now = self.clock.now();
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let record = UpsertRecord {
            cache_key: key.to_string(),
            provider: provider.to_string(),
            endpoint: endpoint.to_string(),
            category: dimensions.category.clone(),
            period: dimensions.period.clone(),
            result_count: result_count(&payload),
            payload,
            expires_at: Duration::try_seconds(ttl)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            now,
        };

        match repository.upsert(&record).await {
            Ok(()) => {
                debug!(
                    cache_key = %key,
                    result_count = record.result_count,
                    ttl_seconds,
                    "Cached payload"
                );
                true
            }
            Err(e) => {
                degraded("upsert", &e);
                false
            }
        }
    }

    /// Read a typed envelope for a request.
    pub async fn get_envelope(
        &self,
        provider: &str,
        endpoint: &str,
        dimensions: &Dimensions,
    ) -> Option<Envelope> {
        let key = build_key(provider, endpoint, dimensions);
        let payload = self.get(&key).await?;
        match serde_json::from_value(payload) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                debug!(cache_key = %key, error = %e, "Cached payload is not an envelope");
                None
            }
        }
    }

    /// Store a typed envelope under the key derived from its own identity.
    pub async fn put_envelope(&self, envelope: &Envelope, ttl_seconds: u64) -> bool {
        let key = build_key(&envelope.provider, &envelope.endpoint, &envelope.dimensions);
        let payload = match serde_json::to_value(envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Failed to serialize envelope");
                return false;
            }
        };
        self.upsert(
            &key,
            &envelope.provider,
            &envelope.endpoint,
            &envelope.dimensions,
            payload,
            ttl_seconds,
        )
        .await
    }

    /// Expired entries, most-requested first, then soonest-expired.
    pub async fn list_expired(&self, limit: u32) -> Vec<CacheEntry> {
        let Some(repository) = self.repository.as_ref() else {
            return Vec::new();
        };
        repository
            .list_expired(self.clock.now(), limit)
            .await
            .unwrap_or_else(|e| {
                degraded("list_expired", &e);
                Vec::new()
            })
    }

    /// Every entry, ordered by provider, endpoint and category.
    pub async fn list_all(&self) -> Vec<CacheEntry> {
        let Some(repository) = self.repository.as_ref() else {
            return Vec::new();
        };
        repository.list_all().await.unwrap_or_else(|e| {
            degraded("list_all", &e);
            Vec::new()
        })
    }

    pub async fn list_by_provider(&self, provider: &str) -> Vec<CacheEntry> {
        let Some(repository) = self.repository.as_ref() else {
            return Vec::new();
        };
        repository
            .list_by_provider(provider)
            .await
            .unwrap_or_else(|e| {
                degraded("list_by_provider", &e);
                Vec::new()
            })
    }

    /// Delete entries not read for `days` days, expired or not.
    pub async fn purge_stale(&self, days: u32) -> u64 {
        let Some(repository) = self.repository.as_ref() else {
            return 0;
        };
        // A threshold reaching past the earliest representable time purges nothing.
        let cutoff = Duration::try_days(i64::from(days))
            .and_then(|age| self.clock.now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        match repository.purge_stale(cutoff).await {
            Ok(removed) => {
                info!(days, removed, "Purged stale cache entries");
                removed
            }
            Err(e) => {
                degraded("purge_stale", &e);
                0
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let Some(repository) = self.repository.as_ref() else {
            return CacheStats::default();
        };
        match repository.stats(self.clock.now()).await {
            Ok((endpoints, totals)) => CacheStats {
                enabled: true,
                endpoints,
                totals,
            },
            Err(e) => {
                degraded("stats", &e);
                CacheStats {
                    enabled: true,
                    ..Default::default()
                }
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        let Some(repository) = self.repository.as_ref() else {
            return false;
        };
        repository.delete(key).await.unwrap_or_else(|e| {
            degraded("delete", &e);
            false
        })
    }

    pub async fn clear_all(&self) -> u64 {
        let Some(repository) = self.repository.as_ref() else {
            return 0;
        };
        match repository.clear_all().await {
            Ok(removed) => {
                info!(removed, "Cleared cache");
                removed
            }
            Err(e) => {
                degraded("clear_all", &e);
                0
            }
        }
    }

    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.repository.as_ref()?.pool_stats()
    }
}

fn degraded(operation: &str, error: &Error) {
    match error {
        Error::StoreUnavailable(_) => {
            warn!(operation, error = %error, "Cache store unavailable, continuing uncached");
        }
        _ => {
            warn!(
                operation,
                kind = error.kind(),
                error = %error,
                "Cache store operation failed, continuing uncached"
            );
        }
    }
}
