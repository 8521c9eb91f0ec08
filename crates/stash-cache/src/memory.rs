//! In-process cache repository.
//!
//! Used by tests and by deployments that run without Postgres. Semantics
//! match the Postgres repository row for row.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use stash_core::ports::CacheRepository;
use stash_core::{CacheEntry, EndpointStats, Error, GlobalStats, Result, UpsertRecord};
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryRepository {
    entries: RwLock<HashMap<String, CacheEntry>>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails with
    /// [`Error::StoreUnavailable`] until set back.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Raw row lookup that ignores expiry and availability.
    pub async fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable(
                "memory repository marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheRepository for MemoryRepository {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        self.check()?;
        let entries = self.entries.read().await;
        Ok(entries.get(key).filter(|e| e.is_valid_at(now)).cloned())
    }

    async fn touch(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        self.check()?;
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.fetch_count += 1;
            entry.last_accessed_at = now;
        }
        Ok(())
    }

    async fn upsert(&self, record: &UpsertRecord) -> Result<()> {
        self.check()?;
        let mut entries = self.entries.write().await;
        match entries.get_mut(&record.cache_key) {
            Some(entry) => {
                entry.provider = record.provider.clone();
                entry.endpoint = record.endpoint.clone();
                entry.category = record.category.clone();
                entry.period = record.period.clone();
                entry.payload = record.payload.clone();
                entry.result_count = record.result_count;
                entry.expires_at = record.expires_at;
                entry.updated_at = record.now;
                entry.refresh_count += 1;
            }
            None => {
                entries.insert(
                    record.cache_key.clone(),
                    CacheEntry {
                        cache_key: record.cache_key.clone(),
                        provider: record.provider.clone(),
                        endpoint: record.endpoint.clone(),
                        category: record.category.clone(),
                        period: record.period.clone(),
                        payload: record.payload.clone(),
                        result_count: record.result_count,
                        fetch_count: 0,
                        refresh_count: 0,
                        created_at: record.now,
                        updated_at: record.now,
                        expires_at: record.expires_at,
                        last_accessed_at: record.now,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<CacheEntry>> {
        self.check()?;
        let entries = self.entries.read().await;
        let mut expired: Vec<CacheEntry> = entries
            .values()
            .filter(|e| !e.is_valid_at(now))
            .cloned()
            .collect();
        expired.sort_by(|a, b| {
            b.fetch_count
                .cmp(&a.fetch_count)
                .then(a.expires_at.cmp(&b.expires_at))
                .then_with(|| a.cache_key.cmp(&b.cache_key))
        });
        expired.truncate(limit as usize);
        Ok(expired)
    }

    async fn list_all(&self) -> Result<Vec<CacheEntry>> {
        self.check()?;
        let mut all: Vec<CacheEntry> = self.entries.read().await.values().cloned().collect();
        all.sort_by(listing_order);
        Ok(all)
    }

    async fn list_by_provider(&self, provider: &str) -> Result<Vec<CacheEntry>> {
        self.check()?;
        let mut matching: Vec<CacheEntry> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.provider == provider)
            .cloned()
            .collect();
        matching.sort_by(listing_order);
        Ok(matching)
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.check()?;
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.last_accessed_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<(Vec<EndpointStats>, GlobalStats)> {
        self.check()?;
        let entries = self.entries.read().await;
        let recent = now - Duration::hours(24);

        let mut groups: BTreeMap<(String, String), Vec<&CacheEntry>> = BTreeMap::new();
        for entry in entries.values() {
            groups
                .entry((entry.provider.clone(), entry.endpoint.clone()))
                .or_default()
                .push(entry);
        }

        let endpoints = groups
            .into_iter()
            .map(|((provider, endpoint), rows)| {
                let total = rows.len() as i64;
                let valid = rows.iter().filter(|e| e.is_valid_at(now)).count() as i64;
                let refreshes: i64 = rows.iter().map(|e| e.refresh_count).sum();
                EndpointStats {
                    provider,
                    endpoint,
                    total_entries: total,
                    valid_entries: valid,
                    expired_entries: total - valid,
                    total_items: rows.iter().map(|e| e.result_count).sum(),
                    total_fetches: rows.iter().map(|e| e.fetch_count).sum(),
                    avg_refresh_count: refreshes as f64 / total as f64,
                    oldest_update: rows.iter().map(|e| e.updated_at).min(),
                    newest_update: rows.iter().map(|e| e.updated_at).max(),
                }
            })
            .collect();

        let total = entries.len() as i64;
        let valid = entries.values().filter(|e| e.is_valid_at(now)).count() as i64;
        let totals = GlobalStats {
            total_entries: total,
            valid_entries: valid,
            expired_entries: total - valid,
            total_items: entries.values().map(|e| e.result_count).sum(),
            total_fetches: entries.values().map(|e| e.fetch_count).sum(),
            accessed_last_24h: entries
                .values()
                .filter(|e| e.last_accessed_at > recent)
                .count() as i64,
        };

        Ok((endpoints, totals))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check()?;
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn clear_all(&self) -> Result<u64> {
        self.check()?;
        let mut entries = self.entries.write().await;
        let removed = entries.len() as u64;
        entries.clear();
        Ok(removed)
    }
}

/// provider, endpoint, category (unset last), then key.
fn listing_order(a: &CacheEntry, b: &CacheEntry) -> CmpOrdering {
    a.provider
        .cmp(&b.provider)
        .then_with(|| a.endpoint.cmp(&b.endpoint))
        .then_with(|| match (&a.category, &b.category) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => CmpOrdering::Less,
            (None, Some(_)) => CmpOrdering::Greater,
            (None, None) => CmpOrdering::Equal,
        })
        .then_with(|| a.cache_key.cmp(&b.cache_key))
}
