//! Fetchers and payloads for tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use stash_core::ports::Fetcher;
use stash_core::{Dimensions, Error, Result};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A list payload with `n` items under `data`.
pub fn list_payload(n: usize) -> Value {
    let items: Vec<Value> = (1..=n)
        .map(|id| json!({"id": id, "title": format!("Title {}", id)}))
        .collect();
    json!({ "data": items })
}

/// Returns a fixed payload and records every call.
pub struct StaticFetcher {
    payload: Value,
    calls: AtomicUsize,
    seen: Mutex<Vec<Dimensions>>,
}

impl StaticFetcher {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Dimensions> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, dimensions: &Dimensions) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(dimensions.clone());
        }
        Ok(self.payload.clone())
    }
}

/// Fails with a 503 for one category value, succeeds for the rest.
pub struct FailingFor {
    category: String,
}

impl FailingFor {
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }
}

#[async_trait]
impl Fetcher for FailingFor {
    async fn fetch(&self, dimensions: &Dimensions) -> Result<Value> {
        if dimensions.category.as_deref() == Some(self.category.as_str()) {
            return Err(Error::Upstream {
                status: 503,
                body: "Service Unavailable".to_string(),
            });
        }
        Ok(list_payload(2))
    }
}
