//! Config-driven JSON endpoints.
//!
//! A [`JsonEndpoint`] turns a URL template plus request dimensions into a
//! call through the [`FetchClient`], optionally selecting the result list out
//! of the response with a JSON pointer. It covers upstreams whose only
//! provider-specific knowledge is "which URL, which list".

use crate::client::{FetchClient, RequestOptions};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stash_core::ports::Fetcher;
use stash_core::{Dimensions, Error, Result, Volatility};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const PLACEHOLDERS: [&str; 5] = ["category", "period", "type", "filter", "day"];

/// One upstream endpoint, as declared in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub provider: String,
    pub endpoint: String,
    /// Absolute URL or path relative to the client's base URL. May contain
    /// `{category}`, `{period}`, `{type}`, `{filter}` and `{day}`.
    pub url: String,
    /// Query parameters; values are templates like the URL. A parameter whose
    /// template references an absent dimension is omitted.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON pointer to the result list, e.g. `/results`.
    #[serde(default)]
    pub items_pointer: Option<String>,
    #[serde(default)]
    pub volatility: Volatility,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
}

/// Fetcher backed by an [`EndpointConfig`].
pub struct JsonEndpoint {
    config: EndpointConfig,
    client: Arc<FetchClient>,
}

impl JsonEndpoint {
    pub fn new(config: EndpointConfig, client: Arc<FetchClient>) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    fn request_options(&self, dimensions: &Dimensions) -> RequestOptions {
        let mut options = RequestOptions::get();
        for (name, template) in &self.config.query {
            options = options.query(name.clone(), render(template, dimensions, false));
        }
        for (name, value) in &self.config.headers {
            options = options.header(name.clone(), value.clone());
        }
        if let Some(ms) = self.config.timeout_ms {
            options = options.timeout(Duration::from_millis(ms));
        }
        if let Some(retries) = self.config.retries {
            options = options.retries(retries);
        }
        options
    }
}

#[async_trait]
impl Fetcher for JsonEndpoint {
    async fn fetch(&self, dimensions: &Dimensions) -> Result<Value> {
        let target = render(&self.config.url, dimensions, true).ok_or_else(|| {
            Error::Rejected(format!(
                "{}/{}: URL template {} needs a dimension that is not set",
                self.config.provider, self.config.endpoint, self.config.url
            ))
        })?;

        let options = self.request_options(dimensions);
        let body: Value = self.client.get_json(&target, &options).await?;

        debug!(
            provider = %self.config.provider,
            endpoint = %self.config.endpoint,
            "Fetched upstream payload"
        );

        match &self.config.items_pointer {
            Some(pointer) => body.pointer(pointer).cloned().ok_or_else(|| {
                Error::Rejected(format!(
                    "{}/{}: response has nothing at {}",
                    self.config.provider, self.config.endpoint, pointer
                ))
            }),
            None => Ok(body),
        }
    }
}

/// Substitute dimension placeholders. Returns `None` if the template
/// references a dimension that is not set.
fn render(template: &str, dimensions: &Dimensions, encode: bool) -> Option<String> {
    let mut out = template.to_string();
    for name in PLACEHOLDERS {
        let placeholder = format!("{{{}}}", name);
        if !out.contains(&placeholder) {
            continue;
        }
        let value = dimensions.get(name)?;
        let value = if encode {
            urlencoding::encode(value).into_owned()
        } else {
            value.to_string()
        };
        out = out.replace(&placeholder, &value);
    }
    Some(out)
}
