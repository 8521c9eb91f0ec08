//! Test context for database-backed tests.

use crate::containers::PostgresContainer;
use stash_cache::CacheStore;
use stash_core::Clock;
use stash_db::{Database, PgCacheRepository};
use std::sync::Arc;

/// PostgreSQL container plus a migrated connection pool.
///
/// Drop this to stop the container.
pub struct TestContext {
    pub postgres: PostgresContainer,
    pub db: Database,
}

impl TestContext {
    /// Start PostgreSQL and apply migrations.
    pub async fn postgres() -> anyhow::Result<Self> {
        crate::init_test_logging();

        let postgres = PostgresContainer::start().await?;
        let db = Database::connect(&postgres.database_config()).await?;
        db.migrate().await?;

        Ok(Self { postgres, db })
    }

    /// Get database connection string.
    pub fn db_url(&self) -> &str {
        self.postgres.connection_string()
    }

    pub fn repository(&self) -> Arc<PgCacheRepository> {
        Arc::new(self.db.cache_repository())
    }

    /// A store over this database driven by `clock`.
    pub fn store(&self, clock: Arc<dyn Clock>) -> CacheStore {
        CacheStore::with_clock(self.repository(), clock)
    }
}
