//! Admin API tests against an in-process server over the in-memory backend.

use chrono::{Duration, TimeZone, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use stash_cache::{CacheStore, MemoryRepository, build_key};
use stash_core::{Dimensions, ManualClock, Volatility};
use stash_fetch::{EndpointConfig, FetchClient, FetchConfig, JsonEndpoint, UpstreamMetrics};
use stash_scheduler::FetcherRegistry;
use stash_tests::{
    ApiTestClient, FailingFor, StaticFetcher, list_payload, start_test_server, test_state,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn memory_store() -> (CacheStore, ManualClock) {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap());
    let store = CacheStore::with_clock(
        Arc::new(MemoryRepository::new()),
        Arc::new(clock.clone()),
    );
    (store, clock)
}

async fn seed(
    store: &CacheStore,
    provider: &str,
    endpoint: &str,
    dims: &Dimensions,
    ttl: u64,
) -> String {
    let key = build_key(provider, endpoint, dims);
    assert!(
        store
            .upsert(&key, provider, endpoint, dims, list_payload(1), ttl)
            .await
    );
    key
}

async fn start(state: Arc<stash_api::AppState>) -> ApiTestClient {
    stash_tests::init_test_logging();
    let (addr, _handle) = start_test_server(state)
        .await
        .expect("Failed to start server");
    ApiTestClient::new(addr)
}

#[tokio::test]
async fn test_health_and_ready() {
    let (store, _clock) = memory_store();
    let mut registry = FetcherRegistry::new();
    registry.register(
        "tmdb",
        "trending",
        Volatility::Standard,
        Arc::new(StaticFetcher::new(list_payload(1))),
    );
    let client = start(test_state(store, registry, UpstreamMetrics::new())).await;

    assert!(client.is_healthy().await);

    let body: Value = client.json(Method::GET, "/ready").await.unwrap();
    assert_eq!(body["cache_enabled"], true);
    assert_eq!(body["registered_fetchers"], 1);
}

#[tokio::test]
async fn test_refresh_expired_counts_failures() {
    let (store, clock) = memory_store();
    for category in ["movie", "tv", "anime"] {
        seed(&store, "tmdb", "trending", &Dimensions::new().category(category), 3_600).await;
    }
    clock.advance(Duration::hours(2));

    let mut registry = FetcherRegistry::new();
    registry.register(
        "tmdb",
        "trending",
        Volatility::Standard,
        Arc::new(FailingFor::category("anime")),
    );
    let client = start(test_state(store.clone(), registry, UpstreamMetrics::new())).await;

    let resp = client.post("/api/v1/cache/refresh").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let summary: Value = resp.json().await.unwrap();
    assert_eq!(summary["sweep"], "expired");
    assert_eq!(summary["attempted"], 3);
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(summary["failed"], 1);

    assert!(store.get("tmdb:trending:movie").await.is_some());
    assert!(store.get("tmdb:trending:tv").await.is_some());
    assert_eq!(store.get("tmdb:trending:anime").await, None);

    let listing: Value = client
        .json(Method::GET, "/api/v1/cache/entries?provider=tmdb")
        .await
        .unwrap();
    let expired: Vec<&str> = listing["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["expired"] == true)
        .map(|e| e["cache_key"].as_str().unwrap())
        .collect();
    assert_eq!(expired, vec!["tmdb:trending:anime"]);
}

#[tokio::test]
async fn test_refresh_provider_through_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending/movie/week"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "results": [{"id": 1}, {"id": 2}, {"id": 3}]
        })))
        .expect(1)
        .mount(&upstream)
        .await;

    let fetch = Arc::new(
        FetchClient::new(FetchConfig {
            base_url: Some(upstream.uri()),
            retries: 0,
            ..Default::default()
        })
        .unwrap(),
    );
    let endpoint = EndpointConfig {
        provider: "tmdb".into(),
        endpoint: "trending".into(),
        url: "trending/{category}/{period}".into(),
        query: BTreeMap::new(),
        headers: BTreeMap::new(),
        items_pointer: Some("/results".into()),
        volatility: Volatility::Standard,
        timeout_ms: None,
        retries: None,
    };
    let mut registry = FetcherRegistry::new();
    registry.register(
        "tmdb",
        "trending",
        Volatility::Standard,
        Arc::new(JsonEndpoint::new(endpoint, Arc::clone(&fetch))),
    );

    let (store, _clock) = memory_store();
    let key = seed(
        &store,
        "tmdb",
        "trending",
        &Dimensions::new().category("movie").period("week"),
        86_400,
    )
    .await;
    seed(&store, "jikan", "top", &Dimensions::new().category("anime"), 86_400).await;

    let client = start(test_state(store.clone(), registry, fetch.metrics())).await;

    let summary: Value = client.json(Method::POST, "/api/v1/cache/refresh/tmdb").await.unwrap();
    assert_eq!(summary["attempted"], 1);
    assert_eq!(summary["succeeded"], 1);

    let payload = store.get(&key).await.expect("refreshed entry");
    assert_eq!(payload.as_array().map(Vec::len), Some(3));

    let upstreams: Value = client.json(Method::GET, "/api/v1/cache/upstreams").await.unwrap();
    let counters: Vec<&Value> = upstreams.as_object().unwrap().values().collect();
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0]["calls"], 1);
    assert_eq!(counters[0]["errors"], 0);
}

#[tokio::test]
async fn test_refresh_all_ignores_expiry() {
    let (store, _clock) = memory_store();
    seed(&store, "tmdb", "trending", &Dimensions::new().category("movie"), 86_400).await;
    seed(&store, "jikan", "top", &Dimensions::new().category("anime"), 86_400).await;

    let fetcher = Arc::new(StaticFetcher::new(list_payload(4)));
    let mut registry = FetcherRegistry::new();
    registry
        .register("tmdb", "trending", Volatility::Standard, fetcher.clone())
        .register("jikan", "top", Volatility::Standard, fetcher.clone());
    let client = start(test_state(store, registry, UpstreamMetrics::new())).await;

    let summary: Value = client.json(Method::POST, "/api/v1/cache/refresh-all").await.unwrap();
    assert_eq!(summary["succeeded"], 2);
    assert_eq!(fetcher.calls(), 2);

    let stats: Value = client.json(Method::GET, "/api/v1/cache/stats").await.unwrap();
    assert_eq!(stats["enabled"], true);
    assert_eq!(stats["totals"]["total_entries"], 2);
    assert_eq!(stats["totals"]["total_items"], 8);
}

#[tokio::test]
async fn test_purge_removes_unread_entries() {
    let (store, clock) = memory_store();
    let movie = Dimensions::new().category("movie");
    let tv = Dimensions::new().category("tv");
    let stale = seed(&store, "tmdb", "trending", &movie, 86_400).await;
    let read = seed(&store, "tmdb", "trending", &tv, 86_400 * 60).await;

    clock.advance(Duration::days(31));
    assert!(store.get(&read).await.is_some());

    let state = test_state(store.clone(), FetcherRegistry::new(), UpstreamMetrics::new());
    let client = start(state).await;
    // The detached read-counter update must land before the purge.
    let touched = stash_tests::wait_for(
        std::time::Duration::from_secs(2),
        std::time::Duration::from_millis(10),
        || {
            let store = store.clone();
            let read = read.clone();
            async move {
                store
                    .list_all()
                    .await
                    .iter()
                    .any(|e| e.cache_key == read && e.fetch_count == 1)
            }
        },
    )
    .await;
    assert!(touched);

    let summary: Value = client.json(Method::DELETE, "/api/v1/cache/purge?days=30").await.unwrap();
    assert_eq!(summary["purged"], 1);

    let keys: Vec<String> = store.list_all().await.into_iter().map(|e| e.cache_key).collect();
    assert_eq!(keys, vec![read]);
    assert!(!keys.contains(&stale));
}

#[tokio::test]
async fn test_entries_pagination_delete_and_clear() {
    let (store, _clock) = memory_store();
    for category in ["a", "b", "c"] {
        seed(&store, "tmdb", "popular", &Dimensions::new().category(category), 3_600).await;
    }
    seed(&store, "jikan", "top", &Dimensions::new(), 3_600).await;
    let client = start(test_state(store, FetcherRegistry::new(), UpstreamMetrics::new())).await;

    let page: Value = client
        .json(Method::GET, "/api/v1/cache/entries?provider=tmdb&limit=2&offset=1")
        .await
        .unwrap();
    assert_eq!(page["total"], 3);
    let keys: Vec<&str> = page["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["cache_key"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["tmdb:popular:b", "tmdb:popular:c"]);

    let resp = client.delete("/api/v1/cache/entries/jikan:top").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = client.delete("/api/v1/cache/entries/jikan:top").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let cleared: Value = client.json(Method::DELETE, "/api/v1/cache/clear").await.unwrap();
    assert_eq!(cleared["removed"], 3);
}

#[tokio::test]
async fn test_disabled_cache_rejects_maintenance() {
    let client = start(test_state(
        CacheStore::disabled(),
        FetcherRegistry::new(),
        UpstreamMetrics::new(),
    ))
    .await;

    let resp = client.post("/api/v1/cache/refresh-all").await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let stats: Value = client.json(Method::GET, "/api/v1/cache/stats").await.unwrap();
    assert_eq!(stats["enabled"], false);
}
