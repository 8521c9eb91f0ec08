//! Per-target counters for upstream health reporting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Counters for one upstream target.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetCounters {
    /// Logical calls, regardless of how many attempts each took.
    pub calls: u64,
    /// Individual attempts, including retries.
    pub attempts: u64,
    /// Logical calls that ultimately failed.
    pub errors: u64,
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Counters for every upstream the client has talked to, keyed by target.
#[derive(Debug, Default)]
pub struct UpstreamMetrics {
    targets: Mutex<HashMap<String, TargetCounters>>,
}

impl UpstreamMetrics {
    /// Create new metrics instance.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_target(&self, target: &str, f: impl FnOnce(&mut TargetCounters)) {
        if let Ok(mut targets) = self.targets.lock() {
            f(targets.entry(target.to_string()).or_default());
        }
    }

    /// Record the start of a logical call.
    pub fn record_call(&self, target: &str) {
        self.with_target(target, |c| {
            c.calls += 1;
            c.last_call_at = Some(Utc::now());
        });
    }

    /// Record a single attempt.
    pub fn record_attempt(&self, target: &str) {
        self.with_target(target, |c| c.attempts += 1);
    }

    /// Record a logical call that failed after all retries.
    pub fn record_error(&self, target: &str, error: &stash_core::Error) {
        self.with_target(target, |c| {
            c.errors += 1;
            c.last_error = Some(error.to_string());
        });
    }

    /// Counters for one target.
    pub fn get(&self, target: &str) -> Option<TargetCounters> {
        self.targets.lock().ok()?.get(target).cloned()
    }

    /// Get a snapshot of current metrics, sorted by target.
    pub fn snapshot(&self) -> BTreeMap<String, TargetCounters> {
        self.targets
            .lock()
            .map(|targets| {
                targets
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate_per_target() {
        let metrics = UpstreamMetrics::new();
        metrics.record_call("api.themoviedb.org");
        metrics.record_attempt("api.themoviedb.org");
        metrics.record_attempt("api.themoviedb.org");
        metrics.record_error(
            "api.themoviedb.org",
            &stash_core::Error::Connection("reset".into()),
        );
        metrics.record_call("graphql.anilist.co");

        let tmdb = metrics.get("api.themoviedb.org").unwrap();
        assert_eq!(tmdb.calls, 1);
        assert_eq!(tmdb.attempts, 2);
        assert_eq!(tmdb.errors, 1);
        assert!(tmdb.last_call_at.is_some());
        assert!(tmdb.last_error.unwrap().contains("reset"));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["graphql.anilist.co"].errors, 0);
    }
}
