//! Wiring from configuration to running components.

use crate::config::{Backend, StashConfig};
use anyhow::Context;
use stash_cache::{CacheStore, MemoryRepository};
use stash_db::Database;
use stash_fetch::{FetchClient, JsonEndpoint, UpstreamMetrics};
use stash_scheduler::{FetcherRegistry, Scheduler};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a command needs.
pub struct App {
    pub store: CacheStore,
    pub scheduler: Arc<Scheduler>,
    pub upstreams: Arc<UpstreamMetrics>,
    pub database: Option<Database>,
}

impl App {
    /// Build the store, the fetcher registry and the scheduler.
    ///
    /// An unreachable database does not fail startup: the pool is created
    /// lazily and the store degrades until the database answers.
    pub async fn build(config: &StashConfig) -> anyhow::Result<Self> {
        let (store, database) = build_store(config).await?;

        let client = Arc::new(
            FetchClient::new(config.fetch.clone()).context("Invalid fetch configuration")?,
        );
        let upstreams = client.metrics();

        let mut registry = FetcherRegistry::new();
        for endpoint in &config.endpoints {
            registry.register(
                endpoint.provider.clone(),
                endpoint.endpoint.clone(),
                endpoint.volatility,
                Arc::new(JsonEndpoint::new(endpoint.clone(), Arc::clone(&client))),
            );
        }
        info!(fetchers = registry.len(), "Fetcher registry built");

        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            Arc::new(registry),
            config.cache.ttl.clone(),
            config.scheduler.clone(),
        ));

        Ok(Self {
            store,
            scheduler,
            upstreams,
            database,
        })
    }
}

async fn build_store(config: &StashConfig) -> anyhow::Result<(CacheStore, Option<Database>)> {
    if !config.cache.enabled {
        info!("Cache disabled by configuration");
        return Ok((CacheStore::disabled(), None));
    }

    match config.cache.backend {
        Backend::Memory => {
            info!("Using in-memory cache backend");
            Ok((CacheStore::new(Arc::new(MemoryRepository::new())), None))
        }
        Backend::Postgres => {
            let db_config = config
                .cache
                .database()
                .context("cache.backend is postgres but cache.database_url is not set")?;

            let database = match Database::connect(&db_config).await {
                Ok(database) => {
                    if let Err(e) = database.migrate().await {
                        warn!(error = %e, "Failed to run migrations");
                    }
                    database
                }
                Err(e) => {
                    warn!(error = %e, "Database unreachable, starting with a lazy pool");
                    Database::connect_lazy(&db_config)?
                }
            };

            let store = CacheStore::new(Arc::new(database.cache_repository()));
            Ok((store, Some(database)))
        }
    }
}
