//! Test helper functions and utilities.

use reqwest::{Client, Method, Response};
use serde_json::Value;
use stash_api::{AppState, build_app};
use stash_cache::CacheStore;
use stash_core::TtlTable;
use stash_fetch::UpstreamMetrics;
use stash_scheduler::{FetcherRegistry, Scheduler, SchedulerConfig};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Scheduler settings for tests: no pause between refreshes, no timers.
pub fn test_scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        refresh_delay_ms: 0,
        sweeps: Vec::new(),
        ..Default::default()
    }
}

/// Application state over `store` with a scheduler for `registry`.
pub fn test_state(
    store: CacheStore,
    registry: FetcherRegistry,
    upstreams: Arc<UpstreamMetrics>,
) -> Arc<AppState> {
    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        Arc::new(registry),
        TtlTable::default(),
        test_scheduler_config(),
    ));
    Arc::new(AppState::new(store, scheduler, upstreams))
}

/// Start an API server for testing and return its address.
pub async fn start_test_server(
    state: Arc<AppState>,
) -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "Test server failed");
        }
    });

    Ok((addr, handle))
}

/// Client for the admin API of a test server.
pub struct ApiTestClient {
    http: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create test client");
        Self {
            http,
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<Response> {
        self.http.get(self.url(path)).send().await
    }

    pub async fn post(&self, path: &str) -> reqwest::Result<Response> {
        self.http.post(self.url(path)).send().await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<Response> {
        self.http.delete(self.url(path)).send().await
    }

    /// Send `method` to `path`, require a 2xx and return the JSON body.
    pub async fn json(&self, method: Method, path: &str) -> anyhow::Result<Value> {
        let resp = self
            .http
            .request(method.clone(), self.url(path))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("{} {} returned {}", method, path, status);
        }
        Ok(resp.json().await?)
    }

    pub async fn is_healthy(&self) -> bool {
        matches!(self.get("/health").await, Ok(resp) if resp.status().is_success())
    }
}

/// Poll `condition` every `interval` until it holds or `timeout` passes.
/// Used to observe detached writes such as read-counter updates.
pub async fn wait_for<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
