//! Fetch client behaviour against a mock upstream.

use serde_json::{Value, json};
use stash_core::ports::Fetcher;
use stash_core::{Dimensions, Error, Volatility};
use stash_fetch::{EndpointConfig, FetchClient, FetchConfig, JsonEndpoint, RequestOptions};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, retries: u32) -> FetchClient {
    FetchClient::new(FetchConfig {
        base_url: Some(format!("{}/", server.uri())),
        timeout_ms: 2_000,
        retries,
        retry_delay_ms: 1,
        ..Default::default()
    })
    .expect("client")
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|r| r.len())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_retries_503_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/trending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [1, 2, 3]})))
        .mount(&server)
        .await;

    let client = client_for(&server, 3);
    let body: Value = client
        .get_json("trending", &RequestOptions::get())
        .await
        .expect("eventually succeeds");

    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_not_found_is_attempted_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie/0"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server, 4);
    let result = client.call("movie/0", &RequestOptions::get()).await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_client_error_keeps_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let client = client_for(&server, 4);
    let result = client.call("search", &RequestOptions::get()).await;

    match result {
        Err(Error::Upstream { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn test_rate_limited_is_retried_then_surfaces() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/popular"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = client_for(&server, 2);
    let result = client.call("popular", &RequestOptions::get()).await;

    assert!(matches!(result, Err(Error::Upstream { status: 429, .. })));
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_slow_upstream_times_out_per_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let options = RequestOptions::get().timeout(Duration::from_millis(50));
    let started = std::time::Instant::now();
    let result = client.call("slow", &options).await;

    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert!(started.elapsed() < Duration::from_millis(450));
}

#[tokio::test]
async fn test_connection_refused_is_classified() {
    let client = FetchClient::new(FetchConfig {
        retries: 1,
        retry_delay_ms: 1,
        ..Default::default()
    })
    .unwrap();

    let result = client
        .call("http://127.0.0.1:1/unreachable", &RequestOptions::get())
        .await;

    assert!(matches!(result, Err(Error::Connection(_))));
    let counters = client.metrics().get("127.0.0.1:1").unwrap();
    assert_eq!(counters.calls, 1);
    assert_eq!(counters.attempts, 2);
    assert_eq!(counters.errors, 1);
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(wiremock::matchers::body_json(json!({"query": "{ Page { id } }"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 0);
    let response = client
        .call(
            "graphql",
            &RequestOptions::post(json!({"query": "{ Page { id } }"})),
        )
        .await
        .expect("post succeeds");

    assert_eq!(response.status, 200);
}

#[tokio::test]
async fn test_json_endpoint_selects_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/trending/movie/week"))
        .and(query_param("language", "en-US"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "results": [{"id": 1}, {"id": 2}]
        })))
        .mount(&server)
        .await;

    let endpoint = JsonEndpoint::new(
        EndpointConfig {
            provider: "tmdb".into(),
            endpoint: "trending".into(),
            url: "trending/{category}/{period}".into(),
            query: BTreeMap::from([("language".to_string(), "en-US".to_string())]),
            headers: BTreeMap::new(),
            items_pointer: Some("/results".into()),
            volatility: Volatility::Standard,
            timeout_ms: None,
            retries: None,
        },
        Arc::new(client_for(&server, 0)),
    );

    let payload = endpoint
        .fetch(&Dimensions::new().category("movie").period("week"))
        .await
        .expect("fetch");

    assert_eq!(payload, json!([{"id": 1}, {"id": 2}]));
}

#[tokio::test]
async fn test_json_endpoint_percent_encodes_path_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex("^/genre/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7}])))
        .mount(&server)
        .await;

    let endpoint = JsonEndpoint::new(
        EndpointConfig {
            provider: "jikan".into(),
            endpoint: "genre".into(),
            url: "genre/{filter}".into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            items_pointer: None,
            volatility: Volatility::Search,
            timeout_ms: None,
            retries: None,
        },
        Arc::new(client_for(&server, 0)),
    );

    let payload = endpoint
        .fetch(&Dimensions::new().filter("sci fi"))
        .await
        .expect("fetch");
    assert_eq!(payload, json!([{"id": 7}]));

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/genre/sci%20fi");
}
