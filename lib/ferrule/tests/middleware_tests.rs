//! Transport layers wired through `ClientBuilder`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert2::check;
use bytes::Bytes;
use ferrule::middleware::CacheConfig;
use ferrule::steps::{json, retry};
use ferrule::{Client, Method, Request, RequestConfig, Response, Result, Transport};
use serde_json::{Value, json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[tokio::test]
async fn repeated_get_is_served_from_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .with_cache(CacheConfig::new())
        .step(json::<Value>())
        .build()
        .expect("client");

    let first = client.get("/users", None).await.expect("first");
    let second = client.get("/users", None).await.expect("second");

    check!(first == second);
    check!(first == json!([{"id": 1}]));
}

#[tokio::test]
async fn different_queries_are_different_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .with_cache(CacheConfig::new())
        .build()
        .expect("client");

    for page in [1, 2, 1, 2] {
        let config = RequestConfig::new().query("page", page);
        client.get("/users", Some(&config)).await.expect("call");
    }
}

#[tokio::test]
async fn clear_cache_forces_a_new_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .with_cache(CacheConfig::new())
        .build()
        .expect("client");

    client.get("/users", None).await.expect("first");
    client.get("/users", None).await.expect("cached");
    client.clear_cache();
    client.get("/users", None).await.expect("refetched");
}

#[tokio::test]
async fn uncached_methods_always_reach_the_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(202))
        .expect(2)
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .with_cache(CacheConfig::new().methods([Method::Get]))
        .build()
        .expect("client");

    for _ in 0..2 {
        let response = client
            .post("/events", json!({"kind": "click"}), None)
            .await
            .expect("call");
        check!(response.status() == 202);
    }
}

/// Counts calls and answers every one with a fixed status.
#[derive(Clone)]
struct Fixed {
    status: u16,
    calls: Arc<AtomicUsize>,
}

impl Fixed {
    fn new(status: u16) -> Self {
        Self {
            status,
            calls: Arc::default(),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for Fixed {
    async fn execute(&self, _request: Request<Bytes>) -> Result<Response<Bytes>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Response::new(self.status, HashMap::new(), Bytes::new()))
    }
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_fetched_again() {
    let transport = Fixed::new(200);
    let client = Client::builder()
        .base_url("http://stub.local")
        .transport(transport.clone())
        .with_cache(CacheConfig::new().lifetime(Duration::from_secs(60)))
        .build()
        .expect("client");

    client.get("/clock", None).await.expect("first");
    tokio::time::advance(Duration::from_secs(59)).await;
    client.get("/clock", None).await.expect("cached");
    check!(transport.calls() == 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    client.get("/clock", None).await.expect("after expiry");
    check!(transport.calls() == 2);
}

#[tokio::test]
async fn failed_responses_are_cached_too() {
    let transport = Fixed::new(503);
    let client = Client::builder()
        .base_url("http://stub.local")
        .transport(transport.clone())
        .with_cache(CacheConfig::new())
        .build()
        .expect("client");

    for _ in 0..3 {
        let response = client.get("/down", None).await.expect("call");
        check!(response.status() == 503);
    }
    check!(transport.calls() == 1);
}

#[tokio::test]
async fn retry_refetches_reach_the_transport_despite_a_cached_failure() {
    let transport = Fixed::new(503);
    let client = Client::builder()
        .base_url("http://stub.local")
        .transport(transport.clone())
        .with_cache(CacheConfig::new())
        .step(retry(2))
        .build()
        .expect("client");

    let first = client.get("/down", None).await.expect("call");
    check!(first.status() == 503);
    check!(transport.calls() == 3);

    // initial answer from the cache, both refetches go through
    let second = client.get("/down", None).await.expect("call");
    check!(second.status() == 503);
    check!(transport.calls() == 5);
}

#[tokio::test]
async fn retry_is_not_served_a_cached_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .with_cache(CacheConfig::new())
        .step(retry(2))
        .step(json::<Value>())
        .build()
        .expect("client");

    check!(client.get("/flaky", None).await.expect("call") == json!({"ok": true}));
    // served from cache now
    check!(client.get("/flaky", None).await.expect("call") == json!({"ok": true}));

    let requests = server.received_requests().await.expect("recording");
    check!(requests.len() == 2);
}

#[tokio::test]
async fn timing_layer_is_transparent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(418))
        .mount(&server)
        .await;

    let client = Client::builder()
        .base_url(server.uri())
        .with_timing()
        .build()
        .expect("client");

    let response = client.get("/ping", None).await.expect("call");
    check!(response.status() == 418);

    let err = client
        .get("http://127.0.0.1:1/ping", None)
        .await
        .expect_err("refused");
    check!(err.is_connection() || err.is_timeout());
}
