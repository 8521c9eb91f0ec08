//! PostgreSQL implementation of CacheRepository.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use stash_core::ports::{CacheRepository, PoolStats};
use stash_core::{CacheEntry, EndpointStats, Error, GlobalStats, Result, UpsertRecord};

const COLUMNS: &str = "cache_key, provider, endpoint, category, period, payload, result_count, \
     fetch_count, refresh_count, created_at, updated_at, expires_at, last_accessed_at";

/// PostgreSQL implementation of CacheRepository.
///
/// All timestamps are bound from the caller's clock; the database's own
/// `NOW()` is never consulted.
#[derive(Clone)]
pub struct PgCacheRepository {
    pool: PgPool,
}

impl PgCacheRepository {
    /// Create a new PgCacheRepository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheRepository for PgCacheRepository {
    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cache_entries WHERE cache_key = $1 AND expires_at > $2"
        ))
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.as_ref().map(row_to_entry))
    }

    async fn touch(&self, key: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE cache_entries SET fetch_count = fetch_count + 1, last_accessed_at = $2 WHERE cache_key = $1",
        )
        .bind(key)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn upsert(&self, record: &UpsertRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (
                cache_key, provider, endpoint, category, period, payload, result_count,
                fetch_count, refresh_count, created_at, updated_at, expires_at, last_accessed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, $8, $8, $9, $8)
            ON CONFLICT (cache_key) DO UPDATE SET
                provider = EXCLUDED.provider,
                endpoint = EXCLUDED.endpoint,
                category = EXCLUDED.category,
                period = EXCLUDED.period,
                payload = EXCLUDED.payload,
                result_count = EXCLUDED.result_count,
                expires_at = EXCLUDED.expires_at,
                updated_at = EXCLUDED.updated_at,
                refresh_count = cache_entries.refresh_count + 1
            "#,
        )
        .bind(&record.cache_key)
        .bind(&record.provider)
        .bind(&record.endpoint)
        .bind(&record.category)
        .bind(&record.period)
        .bind(&record.payload)
        .bind(record.result_count)
        .bind(record.now)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cache_entries WHERE expires_at <= $1 \
             ORDER BY fetch_count DESC, expires_at ASC, cache_key ASC LIMIT $2"
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn list_all(&self) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cache_entries ORDER BY provider, endpoint, category, cache_key"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn list_by_provider(&self, provider: &str) -> Result<Vec<CacheEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM cache_entries WHERE provider = $1 \
             ORDER BY provider, endpoint, category, cache_key"
        ))
        .bind(provider)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.iter().map(row_to_entry).collect())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE last_accessed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, now: DateTime<Utc>) -> Result<(Vec<EndpointStats>, GlobalStats)> {
        let rows = sqlx::query(
            r#"
            SELECT
                provider,
                endpoint,
                COUNT(*) AS total_entries,
                COUNT(*) FILTER (WHERE expires_at > $1) AS valid_entries,
                COUNT(*) FILTER (WHERE expires_at <= $1) AS expired_entries,
                COALESCE(SUM(result_count), 0)::BIGINT AS total_items,
                COALESCE(SUM(fetch_count), 0)::BIGINT AS total_fetches,
                COALESCE(AVG(refresh_count), 0)::FLOAT8 AS avg_refresh_count,
                MIN(updated_at) AS oldest_update,
                MAX(updated_at) AS newest_update
            FROM cache_entries
            GROUP BY provider, endpoint
            ORDER BY provider, endpoint
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let endpoints = rows
            .iter()
            .map(|r| EndpointStats {
                provider: r.get("provider"),
                endpoint: r.get("endpoint"),
                total_entries: r.get("total_entries"),
                valid_entries: r.get("valid_entries"),
                expired_entries: r.get("expired_entries"),
                total_items: r.get("total_items"),
                total_fetches: r.get("total_fetches"),
                avg_refresh_count: r.get("avg_refresh_count"),
                oldest_update: r.get("oldest_update"),
                newest_update: r.get("newest_update"),
            })
            .collect();

        let r = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total_entries,
                COUNT(*) FILTER (WHERE expires_at > $1) AS valid_entries,
                COUNT(*) FILTER (WHERE expires_at <= $1) AS expired_entries,
                COALESCE(SUM(result_count), 0)::BIGINT AS total_items,
                COALESCE(SUM(fetch_count), 0)::BIGINT AS total_fetches,
                COUNT(*) FILTER (WHERE last_accessed_at > $2) AS accessed_last_24h
            FROM cache_entries
            "#,
        )
        .bind(now)
        .bind(now - Duration::hours(24))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let totals = GlobalStats {
            total_entries: r.get("total_entries"),
            valid_entries: r.get("valid_entries"),
            expired_entries: r.get("expired_entries"),
            total_items: r.get("total_items"),
            total_fetches: r.get("total_fetches"),
            accessed_last_24h: r.get("accessed_last_24h"),
        };

        Ok((endpoints, totals))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE cache_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected())
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_connections: self.pool.options().get_max_connections(),
        })
    }
}

fn row_to_entry(r: &PgRow) -> CacheEntry {
    CacheEntry {
        cache_key: r.get("cache_key"),
        provider: r.get("provider"),
        endpoint: r.get("endpoint"),
        category: r.get("category"),
        period: r.get("period"),
        payload: r.get("payload"),
        result_count: r.get("result_count"),
        fetch_count: r.get("fetch_count"),
        refresh_count: r.get("refresh_count"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        expires_at: r.get("expires_at"),
        last_accessed_at: r.get("last_accessed_at"),
    }
}

/// Connection-level failures mean the store is unreachable; anything else is
/// a query problem.
fn db_error(e: sqlx::Error) -> Error {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => Error::StoreUnavailable(e.to_string()),
        other => Error::Database(other.to_string()),
    }
}
