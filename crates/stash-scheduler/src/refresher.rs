//! Re-fetch and re-store one cache entry.

use crate::registry::FetcherRegistry;
use stash_cache::{CacheStore, parse_key};
use stash_core::{CacheEntry, Dimensions, Error, Result, TtlTable};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Refresher {
    store: CacheStore,
    registry: Arc<FetcherRegistry>,
    ttl: TtlTable,
}

impl Refresher {
    pub fn new(store: CacheStore, registry: Arc<FetcherRegistry>, ttl: TtlTable) -> Self {
        Self {
            store,
            registry,
            ttl,
        }
    }

    pub fn registry(&self) -> &FetcherRegistry {
        &self.registry
    }

    /// Refresh `entry` from its upstream. Returns whether the new payload
    /// was stored. Never fails.
    pub async fn refresh_entry(&self, entry: &CacheEntry) -> bool {
        match self.try_refresh(entry).await {
            Ok(ttl_seconds) => {
                debug!(
                    cache_key = %entry.cache_key,
                    ttl_seconds,
                    "Refreshed cache entry"
                );
                true
            }
            Err(Error::NoFetcherRegistered { provider, endpoint }) => {
                info!(
                    cache_key = %entry.cache_key,
                    provider = %provider,
                    endpoint = %endpoint,
                    "No fetcher registered, skipping refresh"
                );
                false
            }
            Err(e) => {
                warn!(
                    cache_key = %entry.cache_key,
                    provider = %entry.provider,
                    endpoint = %entry.endpoint,
                    error = %e,
                    "Failed to refresh cache entry"
                );
                false
            }
        }
    }

    async fn try_refresh(&self, entry: &CacheEntry) -> Result<u64> {
        let registered = self
            .registry
            .lookup(&entry.provider, &entry.endpoint)
            .ok_or_else(|| Error::NoFetcherRegistered {
                provider: entry.provider.clone(),
                endpoint: entry.endpoint.clone(),
            })?;

        let dimensions = reconstruct_dimensions(entry);
        let payload = registered.fetcher.fetch(&dimensions).await?;
        let ttl_seconds = self.ttl.ttl_for(registered.volatility);

        let stored = self
            .store
            .upsert(
                &entry.cache_key,
                &entry.provider,
                &entry.endpoint,
                &dimensions,
                payload,
                ttl_seconds,
            )
            .await;
        if !stored {
            return Err(Error::StoreUnavailable(format!(
                "could not write {}",
                entry.cache_key
            )));
        }
        Ok(ttl_seconds)
    }
}

/// Dimensions a stored entry was fetched with: the first-class columns,
/// plus whatever else the key carries.
pub fn reconstruct_dimensions(entry: &CacheEntry) -> Dimensions {
    let mut dimensions = parse_key(&entry.cache_key)
        .map(|parsed| parsed.dimensions)
        .unwrap_or_default();
    if entry.category.is_some() {
        dimensions.category = entry.category.clone();
    }
    if entry.period.is_some() {
        dimensions.period = entry.period.clone();
    }
    dimensions
}
