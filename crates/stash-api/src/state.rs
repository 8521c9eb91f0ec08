//! Application state shared across handlers.

use stash_cache::CacheStore;
use stash_fetch::UpstreamMetrics;
use stash_scheduler::Scheduler;
use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: CacheStore,
    pub scheduler: Arc<Scheduler>,
    pub upstreams: Arc<UpstreamMetrics>,
}

impl AppState {
    pub fn new(
        store: CacheStore,
        scheduler: Arc<Scheduler>,
        upstreams: Arc<UpstreamMetrics>,
    ) -> Self {
        Self {
            store,
            scheduler,
            upstreams,
        }
    }
}
