//! Sweep execution and periodic triggers.

use crate::refresher::Refresher;
use crate::registry::FetcherRegistry;
use crate::triggers::{SweepConfig, SweepKind, Trigger, default_sweeps};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stash_cache::CacheStore;
use stash_core::{CacheEntry, Result, TtlTable};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Pause between two refreshes of the same sweep.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
    #[serde(default = "default_expired_batch_size")]
    pub expired_batch_size: u32,
    #[serde(default = "default_purge_after_days")]
    pub purge_after_days: u32,
    #[serde(default = "default_sweeps")]
    pub sweeps: Vec<SweepConfig>,
}

fn default_enabled() -> bool {
    true
}

fn default_refresh_delay_ms() -> u64 {
    1_000
}

fn default_expired_batch_size() -> u32 {
    50
}

fn default_purge_after_days() -> u32 {
    30
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            refresh_delay_ms: default_refresh_delay_ms(),
            expired_batch_size: default_expired_batch_size(),
            purge_after_days: default_purge_after_days(),
            sweeps: default_sweeps(),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub sweep: String,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Rows deleted by a purge sweep.
    pub purged: u64,
    pub duration_ms: u64,
}

/// Runs refresh and purge sweeps against the cache store.
pub struct Scheduler {
    store: CacheStore,
    refresher: Refresher,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        store: CacheStore,
        registry: Arc<FetcherRegistry>,
        ttl: TtlTable,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            refresher: Refresher::new(store.clone(), registry, ttl),
            store,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn registry(&self) -> &FetcherRegistry {
        self.refresher.registry()
    }

    /// Run one sweep to completion.
    pub async fn run_sweep(&self, kind: &SweepKind) -> SweepSummary {
        match kind {
            SweepKind::Provider { provider } => self.refresh_provider(provider).await,
            SweepKind::Family { providers } => self.refresh_family(providers).await,
            SweepKind::Expired { batch_size } => self.refresh_expired(*batch_size).await,
            SweepKind::All => self.refresh_all().await,
            SweepKind::Purge { days } => self.purge(*days).await,
        }
    }

    /// Refresh every entry of one provider.
    pub async fn refresh_provider(&self, provider: &str) -> SweepSummary {
        let entries = self.store.list_by_provider(provider).await;
        self.refresh_entries(format!("provider:{}", provider), entries)
            .await
    }

    /// Refresh each provider of a family in turn, as one sweep.
    pub async fn refresh_family(&self, providers: &[String]) -> SweepSummary {
        let mut entries = Vec::new();
        for provider in providers {
            entries.extend(self.store.list_by_provider(provider).await);
        }
        self.refresh_entries(format!("family:{}", providers.join(",")), entries)
            .await
    }

    /// Refresh up to `batch_size` expired entries, most-requested first.
    pub async fn refresh_expired(&self, batch_size: Option<u32>) -> SweepSummary {
        let limit = batch_size.unwrap_or(self.config.expired_batch_size);
        let entries = self.store.list_expired(limit).await;
        self.refresh_entries("expired".to_string(), entries).await
    }

    /// Refresh every entry regardless of expiration.
    pub async fn refresh_all(&self) -> SweepSummary {
        let entries = self.store.list_all().await;
        self.refresh_entries("all".to_string(), entries).await
    }

    /// Delete entries not read for `days` (or the configured threshold).
    pub async fn purge(&self, days: Option<u32>) -> SweepSummary {
        let started = Instant::now();
        let days = days.unwrap_or(self.config.purge_after_days);
        let purged = self.store.purge_stale(days).await;
        SweepSummary {
            sweep: "purge".to_string(),
            purged,
            duration_ms: started.elapsed().as_millis() as u64,
            ..Default::default()
        }
    }

    /// Refresh entries one at a time with a fixed pause in between. A failed
    /// entry is counted and skipped.
    async fn refresh_entries(&self, sweep: String, entries: Vec<CacheEntry>) -> SweepSummary {
        let started = Instant::now();
        let delay = Duration::from_millis(self.config.refresh_delay_ms);
        let mut summary = SweepSummary {
            sweep,
            ..Default::default()
        };

        info!(sweep = %summary.sweep, entries = entries.len(), "Starting refresh sweep");

        for (i, entry) in entries.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            summary.attempted += 1;
            if self.refresher.refresh_entry(entry).await {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            sweep = %summary.sweep,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Refresh sweep finished"
        );
        summary
    }

    /// Spawn one task per configured sweep.
    ///
    /// With the store or the scheduler disabled this starts nothing and
    /// returns an idle handle. Fails only on an unparseable schedule.
    pub fn start(self: &Arc<Self>) -> Result<SchedulerHandle> {
        if !self.store.is_enabled() {
            info!("Cache store disabled, scheduler not started");
            return Ok(SchedulerHandle::idle());
        }
        if !self.config.enabled {
            info!("Scheduler disabled by configuration");
            return Ok(SchedulerHandle::idle());
        }

        let triggers = self
            .config
            .sweeps
            .iter()
            .cloned()
            .map(Trigger::parse)
            .collect::<Result<Vec<_>>>()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tasks = triggers
            .into_iter()
            .map(|trigger| {
                info!(sweep = %trigger.name(), kind = %trigger.kind(), "Scheduling sweep");
                tokio::spawn(run_trigger(Arc::clone(self), trigger, shutdown_rx.clone()))
            })
            .collect();

        Ok(SchedulerHandle {
            shutdown: Some(shutdown_tx),
            tasks,
        })
    }
}

/// Fire `trigger` until shutdown. A sweep that has started runs to the end.
async fn run_trigger(
    scheduler: Arc<Scheduler>,
    trigger: Trigger,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = trigger.next_after(now) else {
            info!(sweep = %trigger.name(), "Schedule has no upcoming runs");
            break;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        debug!(sweep = %trigger.name(), next = %next, "Waiting for next sweep");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let summary = scheduler.run_sweep(trigger.kind()).await;
        if summary.failed > 0 {
            warn!(
                sweep = %trigger.name(),
                failed = summary.failed,
                attempted = summary.attempted,
                "Scheduled sweep had failures"
            );
        }
    }
    info!(sweep = %trigger.name(), "Sweep task stopped");
}

/// Handle to the running sweep tasks.
pub struct SchedulerHandle {
    shutdown: Option<watch::Sender<bool>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    fn idle() -> Self {
        Self {
            shutdown: None,
            tasks: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every sweep task and wait for it. In-flight sweeps finish first.
    pub async fn stop(self) {
        if let Some(shutdown) = &self.shutdown {
            let _ = shutdown.send(true);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Sweep task ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::{Value, json};
    use stash_cache::{MemoryRepository, build_key};
    use stash_core::ports::Fetcher;
    use stash_core::{Dimensions, Error, ManualClock, Volatility};

    /// Fails for one category, succeeds otherwise.
    struct FailsOn(&'static str);

    #[async_trait]
    impl Fetcher for FailsOn {
        async fn fetch(&self, dimensions: &Dimensions) -> stash_core::Result<Value> {
            if dimensions.category.as_deref() == Some(self.0) {
                return Err(Error::Connection("connection reset".to_string()));
            }
            Ok(json!([{"id": 1}]))
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            refresh_delay_ms: 0,
            sweeps: Vec::new(),
            ..Default::default()
        }
    }

    async fn seeded(
        clock: &ManualClock,
        keys: &[(&str, &str, &str)],
        ttl: u64,
    ) -> (CacheStore, Arc<MemoryRepository>) {
        let repo = Arc::new(MemoryRepository::new());
        let store = CacheStore::with_clock(repo.clone(), Arc::new(clock.clone()));
        for (provider, endpoint, category) in keys {
            let dims = Dimensions::new().category(*category);
            let key = build_key(provider, endpoint, &dims);
            store
                .upsert(&key, provider, endpoint, &dims, json!([]), ttl)
                .await;
        }
        (store, repo)
    }

    fn registry(entries: &[(&str, &str)], fetcher: Arc<dyn Fetcher>) -> Arc<FetcherRegistry> {
        let mut registry = FetcherRegistry::new();
        for (provider, endpoint) in entries {
            registry.register(*provider, *endpoint, Volatility::Standard, fetcher.clone());
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_expired_sweep_continues_past_failure() {
        let clock = ManualClock::default();
        let categories = ["c1", "c2", "c3", "c4", "c5"];
        let keys: Vec<_> = categories.iter().map(|c| ("tmdb", "trending", *c)).collect();
        let (store, _repo) = seeded(&clock, &keys, 60).await;
        clock.advance(ChronoDuration::seconds(61));

        let scheduler = Scheduler::new(
            store,
            registry(&[("tmdb", "trending")], Arc::new(FailsOn("c3"))),
            TtlTable::default(),
            config(),
        );
        let summary = scheduler.refresh_expired(Some(10)).await;

        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_provider_sweep_is_scoped() {
        let clock = ManualClock::default();
        let (store, repo) = seeded(
            &clock,
            &[
                ("tmdb", "trending", "movie"),
                ("tmdb", "trending", "tv"),
                ("jikan", "top", "anime"),
            ],
            3_600,
        )
        .await;

        let scheduler = Scheduler::new(
            store,
            registry(
                &[("tmdb", "trending"), ("jikan", "top")],
                Arc::new(FailsOn("none")),
            ),
            TtlTable::default(),
            config(),
        );
        let summary = scheduler.refresh_provider("tmdb").await;

        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(repo.peek("jikan:top:anime").await.unwrap().refresh_count, 0);
        assert_eq!(repo.peek("tmdb:trending:tv").await.unwrap().refresh_count, 1);
    }

    #[tokio::test]
    async fn test_family_sweep_covers_each_provider() {
        let clock = ManualClock::default();
        let (store, _repo) = seeded(
            &clock,
            &[
                ("jikan", "top", "anime"),
                ("anilist", "trending", "anime"),
                ("tmdb", "trending", "movie"),
            ],
            3_600,
        )
        .await;

        let scheduler = Scheduler::new(
            store,
            registry(&[("jikan", "top")], Arc::new(FailsOn("none"))),
            TtlTable::default(),
            config(),
        );
        let summary = scheduler
            .run_sweep(&SweepKind::Family {
                providers: vec!["jikan".into(), "anilist".into()],
            })
            .await;

        // anilist has no registered fetcher.
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_refresh_all_ignores_expiry() {
        let clock = ManualClock::default();
        let (store, _repo) = seeded(
            &clock,
            &[("tmdb", "trending", "movie"), ("tmdb", "trending", "tv")],
            3_600,
        )
        .await;

        let scheduler = Scheduler::new(
            store.clone(),
            registry(&[("tmdb", "trending")], Arc::new(FailsOn("none"))),
            TtlTable::default(),
            config(),
        );

        assert!(store.list_expired(10).await.is_empty());
        assert_eq!(scheduler.refresh_all().await.succeeded, 2);
    }

    #[tokio::test]
    async fn test_purge_uses_configured_threshold() {
        let clock = ManualClock::default();
        let (store, repo) = seeded(&clock, &[("tmdb", "trending", "movie")], 3_600).await;
        let scheduler = Scheduler::new(
            store,
            Arc::new(FetcherRegistry::new()),
            TtlTable::default(),
            SchedulerConfig {
                purge_after_days: 7,
                ..config()
            },
        );

        clock.advance(ChronoDuration::days(6));
        assert_eq!(scheduler.purge(None).await.purged, 0);
        clock.advance(ChronoDuration::days(2));
        assert_eq!(scheduler.purge(None).await.purged, 1);
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_sweep_pauses_between_refreshes() {
        let clock = ManualClock::default();
        let keys = [("tmdb", "trending", "a"), ("tmdb", "trending", "b"), ("tmdb", "trending", "c")];
        let (store, _repo) = seeded(&clock, &keys, 3_600).await;
        let scheduler = Scheduler::new(
            store,
            registry(&[("tmdb", "trending")], Arc::new(FailsOn("none"))),
            TtlTable::default(),
            SchedulerConfig {
                refresh_delay_ms: 40,
                ..config()
            },
        );

        let summary = scheduler.refresh_all().await;
        assert_eq!(summary.attempted, 3);
        assert!(summary.duration_ms >= 80);
    }

    #[tokio::test]
    async fn test_start_is_noop_when_store_disabled() {
        let scheduler = Arc::new(Scheduler::new(
            CacheStore::disabled(),
            Arc::new(FetcherRegistry::new()),
            TtlTable::default(),
            SchedulerConfig::default(),
        ));

        let handle = scheduler.start().unwrap();
        assert_eq!(handle.task_count(), 0);
        assert!(!handle.is_running());
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_start_rejects_bad_schedule() {
        let scheduler = Arc::new(Scheduler::new(
            CacheStore::new(Arc::new(MemoryRepository::new())),
            Arc::new(FetcherRegistry::new()),
            TtlTable::default(),
            SchedulerConfig {
                sweeps: vec![SweepConfig::new("bad", "not a schedule", SweepKind::All)],
                ..config()
            },
        ));

        assert!(matches!(scheduler.start(), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_scheduled_sweep_fires_and_stops() {
        let clock = ManualClock::default();
        let (store, repo) = seeded(&clock, &[("tmdb", "trending", "movie")], 60).await;
        clock.advance(ChronoDuration::seconds(120));

        let scheduler = Arc::new(Scheduler::new(
            store,
            registry(&[("tmdb", "trending")], Arc::new(FailsOn("none"))),
            TtlTable::default(),
            SchedulerConfig {
                sweeps: vec![SweepConfig::new(
                    "every-second",
                    "* * * * * *",
                    SweepKind::Expired { batch_size: None },
                )],
                ..config()
            },
        ));

        let handle = scheduler.start().unwrap();
        assert_eq!(handle.task_count(), 1);

        let key = build_key("tmdb", "trending", &Dimensions::new().category("movie"));
        let mut refreshed = false;
        for _ in 0..60 {
            if repo.peek(&key).await.map(|e| e.refresh_count) == Some(1) {
                refreshed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(refreshed, "scheduled sweep did not run");

        handle.stop().await;
    }
}
