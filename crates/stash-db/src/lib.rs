//! PostgreSQL storage for stash.

pub mod repositories;

pub use repositories::*;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use stash_core::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
    }
}

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = config
            .pool_options()
            .connect(&config.url)
            .await
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Build a pool that connects on first use. Lets the service start while
    /// the database is down and pick it up once it returns.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        let pool = config
            .pool_options()
            .connect_lazy(&config.url)
            .map_err(|e| Error::Config(format!("Invalid database URL: {}", e)))?;
        Ok(Self { pool })
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    pub fn cache_repository(&self) -> PgCacheRepository {
        PgCacheRepository::new(self.pool.clone())
    }
}
