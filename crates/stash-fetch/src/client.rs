//! Resilient HTTP client for upstream providers.

use crate::metrics::UpstreamMetrics;
use crate::retry::RetryPolicy;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stash_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Base URL that relative targets are joined to.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Additional attempts after the first for retryable failures.
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("stash/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
        }
    }
}

/// Options for a single logical call. Unset fields fall back to the client's
/// configuration.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, Option<String>)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_delay: Option<Duration>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
            retries: None,
            retry_delay: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter. `None` values are skipped when the URL is built.
    pub fn query<V: Into<String>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }
}

/// A successful upstream response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client with per-attempt timeouts, bounded retries and error
/// classification.
#[derive(Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    config: FetchConfig,
    base_url: Option<Url>,
    metrics: Arc<UpstreamMetrics>,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| Error::Config(format!("Invalid base URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            base_url,
            metrics: UpstreamMetrics::new(),
        })
    }

    pub fn metrics(&self) -> Arc<UpstreamMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve a target against the base URL and append query parameters,
    /// skipping unset values. Absolute targets pass through unchanged.
    pub fn build_url(&self, target: &str, query: &[(String, Option<String>)]) -> Result<Url> {
        let parsed = if target.starts_with("http://") || target.starts_with("https://") {
            Url::parse(target)
        } else {
            let base = self.base_url.as_ref().ok_or_else(|| {
                Error::Config(format!("Relative target {} with no base URL", target))
            })?;
            base.join(target.trim_start_matches('/'))
        };
        let mut url =
            parsed.map_err(|e| Error::Config(format!("Invalid target {}: {}", target, e)))?;

        let present: Vec<_> = query
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }

        Ok(url)
    }

    /// Perform one logical call, retrying transient failures.
    pub async fn call(&self, target: &str, options: &RequestOptions) -> Result<FetchResponse> {
        let url = self.build_url(target, &options.query)?;
        let key = metric_key(&url);
        let timeout = options
            .timeout
            .unwrap_or(Duration::from_millis(self.config.timeout_ms));
        let policy = RetryPolicy::new(
            options.retries.unwrap_or(self.config.retries),
            options
                .retry_delay
                .unwrap_or(Duration::from_millis(self.config.retry_delay_ms)),
        );

        self.metrics.record_call(&key);

        let url = &url;
        let key_ref = key.as_str();
        let result = policy
            .run(move |attempt| {
                self.metrics.record_attempt(key_ref);
                self.attempt(url, options, timeout, attempt)
            })
            .await;

        if let Err(e) = &result {
            self.metrics.record_error(&key, e);
        }
        result
    }

    /// GET a target and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        target: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        self.call(target, options).await?.json()
    }

    async fn attempt(
        &self,
        url: &Url,
        options: &RequestOptions,
        timeout: Duration,
        attempt: u32,
    ) -> Result<FetchResponse> {
        let mut request = self.http.request(options.method.clone(), url.clone());
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        debug!(url = %url, method = %options.method, attempt, "Calling upstream");

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Err(_) => Err(Error::Timeout {
                target: url.to_string(),
            }),
            Ok(Err(e)) => Err(classify_transport(e, url)),
            Ok(Ok((status, body))) => classify_status(status, body, url),
        }
    }
}

fn classify_transport(e: reqwest::Error, url: &Url) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            target: url.to_string(),
        }
    } else {
        Error::Connection(format!("{}: {}", url, e))
    }
}

fn classify_status(status: StatusCode, body: String, url: &Url) -> Result<FetchResponse> {
    if status.is_success() {
        return Ok(FetchResponse {
            status: status.as_u16(),
            body,
        });
    }
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(url.to_string()));
    }
    Err(Error::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Counters are kept per upstream host.
fn metric_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("unknown");
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
