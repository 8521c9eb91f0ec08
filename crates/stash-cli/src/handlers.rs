//! Command handlers.

use crate::app::App;
use crate::config::StashConfig;
use anyhow::{Context, bail};
use serde::Serialize;
use stash_api::AppState;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run the admin API and the scheduler until interrupted.
pub async fn serve(config: &StashConfig, bind: Option<String>) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    let scheduler = app.scheduler.start()?;

    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;

    let state = Arc::new(AppState::new(
        app.store.clone(),
        Arc::clone(&app.scheduler),
        Arc::clone(&app.upstreams),
    ));

    stash_api::serve(listener, state, shutdown_signal()).await?;

    scheduler.stop().await;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub async fn stats(config: &StashConfig) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    print_json(&app.store.stats().await)
}

pub async fn refresh_provider(config: &StashConfig, provider: &str) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    print_json(&app.scheduler.refresh_provider(provider).await)
}

pub async fn refresh_expired(config: &StashConfig, batch: Option<u32>) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    print_json(&app.scheduler.refresh_expired(batch).await)
}

pub async fn refresh_all(config: &StashConfig) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    print_json(&app.scheduler.refresh_all().await)
}

pub async fn purge(config: &StashConfig, days: Option<u32>) -> anyhow::Result<()> {
    let app = App::build(config).await?;
    print_json(&app.scheduler.purge(days).await)
}

pub async fn clear(config: &StashConfig, yes: bool) -> anyhow::Result<()> {
    if !yes {
        bail!("Refusing to clear the cache without --yes");
    }
    let app = App::build(config).await?;
    let removed = app.store.clear_all().await;
    println!("Removed {} entries", removed);
    Ok(())
}

pub async fn migrate(config: &StashConfig) -> anyhow::Result<()> {
    let db_config = config
        .cache
        .database()
        .context("cache.database_url is not set")?;
    let database = stash_db::Database::connect(&db_config).await?;
    database.migrate().await?;
    println!("Migrations applied");
    Ok(())
}
