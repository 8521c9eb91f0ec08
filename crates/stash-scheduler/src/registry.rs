//! Provider/endpoint to fetcher mapping.

use stash_core::Volatility;
use stash_core::ports::Fetcher;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A fetcher and the volatility class its data belongs to.
#[derive(Clone)]
pub struct RegisteredFetcher {
    pub volatility: Volatility,
    pub fetcher: Arc<dyn Fetcher>,
}

/// Built once at startup and handed to the refresher.
#[derive(Clone, Default)]
pub struct FetcherRegistry {
    fetchers: HashMap<(String, String), RegisteredFetcher>,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher, replacing any previous one for the same pair.
    pub fn register(
        &mut self,
        provider: impl Into<String>,
        endpoint: impl Into<String>,
        volatility: Volatility,
        fetcher: Arc<dyn Fetcher>,
    ) -> &mut Self {
        self.fetchers.insert(
            (provider.into(), endpoint.into()),
            RegisteredFetcher {
                volatility,
                fetcher,
            },
        );
        self
    }

    pub fn lookup(&self, provider: &str, endpoint: &str) -> Option<&RegisteredFetcher> {
        self.fetchers
            .get(&(provider.to_string(), endpoint.to_string()))
    }

    pub fn providers(&self) -> BTreeSet<&str> {
        self.fetchers.keys().map(|(p, _)| p.as_str()).collect()
    }

    /// Registered pairs with their volatility, sorted.
    pub fn endpoints(&self) -> Vec<(&str, &str, Volatility)> {
        let mut all: Vec<_> = self
            .fetchers
            .iter()
            .map(|((p, e), r)| (p.as_str(), e.as_str(), r.volatility))
            .collect();
        all.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        all
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}
