//! Time-boxed response cache.
//!
//! Responses are keyed on the whole resolved request: method, URL, headers
//! and body. An entry lives for [`CacheConfig::lifetime`] and is then evicted
//! by a background timer. Every response is stored, failures included.
//!
//! A refetch (see [`Request::is_refetch`]) skips the lookup and always reaches
//! the wrapped service; its response replaces the stored one. A retry step
//! therefore never gets its own failure back from the cache.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, trace};

use crate::{Error, Method, Request, Response, Result};

/// Default lifetime of a cache entry: five minutes.
pub const DEFAULT_CACHE_LIFETIME: Duration = Duration::from_millis(300_000);

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When `false` every call goes to the transport.
    pub enabled: bool,
    /// How long an entry is served before it is evicted.
    pub lifetime: Duration,
    /// Methods whose responses may be cached.
    pub methods: Vec<Method>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lifetime: DEFAULT_CACHE_LIFETIME,
            methods: Method::ALL.to_vec(),
        }
    }
}

impl CacheConfig {
    /// Enabled cache with the default lifetime, caching every method.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A configuration that never caches.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Sets the entry lifetime.
    #[must_use]
    pub const fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Restricts caching to the given methods.
    #[must_use]
    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    fn applies_to(&self, method: Method) -> bool {
        self.enabled && self.methods.contains(&method)
    }
}

#[derive(Debug)]
struct Entry {
    response: Response<Bytes>,
    expires_at: Instant,
}

type Entries = Mutex<HashMap<String, Entry>>;

/// Shared storage behind a [`CacheLayer`].
///
/// Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    entries: Arc<Entries>,
}

impl CacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The live entry for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Response<Bytes>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.response.clone())
    }

    /// Stores `response` under `key` and schedules its eviction.
    ///
    /// Must be called from within a tokio runtime.
    pub fn insert(&self, key: String, response: Response<Bytes>, lifetime: Duration) {
        let expires_at = Instant::now() + lifetime;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.clone(),
                Entry {
                    response,
                    expires_at,
                },
            );

        let entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            evict(&entries, &key);
        });
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        trace!(count = entries.len(), "clearing cache");
        entries.clear();
    }

    /// Number of stored entries, expired or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// The key may have been refreshed since this timer was armed.
fn evict(entries: &Weak<Entries>, key: &str) {
    let Some(entries) = entries.upgrade() else {
        return;
    };
    let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
    if entries
        .get(key)
        .is_some_and(|entry| entry.expires_at <= Instant::now())
    {
        trace!(key, "evicting cache entry");
        entries.remove(key);
    }
}

#[derive(Serialize)]
struct CacheKey<'a> {
    method: &'a str,
    url: &'a str,
    headers: BTreeMap<&'a str, &'a str>,
    body: Option<&'a [u8]>,
}

fn cache_key(request: &Request<Bytes>) -> Result<String> {
    let key = CacheKey {
        method: request.method().as_str(),
        url: request.url().as_str(),
        headers: request
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect(),
        body: request.body().map(Bytes::as_ref),
    };
    Ok(serde_json::to_string(&key)?)
}

/// Layer that serves repeated calls from a [`CacheStore`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ferrule::Method;
/// use ferrule::middleware::{CacheConfig, CacheLayer};
///
/// let layer = CacheLayer::new(
///     CacheConfig::new()
///         .lifetime(Duration::from_secs(60))
///         .methods([Method::Get]),
/// );
/// assert!(layer.store().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct CacheLayer {
    config: Arc<CacheConfig>,
    store: CacheStore,
}

impl CacheLayer {
    /// Layer with its own empty store.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self::with_store(config, CacheStore::new())
    }

    /// Layer over an existing store.
    #[must_use]
    pub fn with_store(config: CacheConfig, store: CacheStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// The store this layer writes to.
    #[must_use]
    pub const fn store(&self) -> &CacheStore {
        &self.store
    }
}

impl<S> Layer<S> for CacheLayer {
    type Service = Cache<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Cache {
            inner,
            config: Arc::clone(&self.config),
            store: self.store.clone(),
        }
    }
}

/// Service that caches the responses of the service it wraps.
#[derive(Debug, Clone)]
pub struct Cache<S> {
    inner: S,
    config: Arc<CacheConfig>,
    store: CacheStore,
}

impl<S> Service<Request<Bytes>> for Cache<S>
where
    S: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let config = Arc::clone(&self.config);
        let store = self.store.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !config.applies_to(request.method()) {
                return inner.call(request).await;
            }

            let key = cache_key(&request)?;
            if request.is_refetch() {
                trace!(url = %request.url(), "refetch bypasses the cache");
            } else if let Some(response) = store.get(&key) {
                debug!(url = %request.url(), "cache hit");
                return Ok(response);
            }

            let response = inner.call(request).await?;
            store.insert(key, response.clone(), config.lifetime);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU16, Ordering};

    use tower::ServiceExt;

    use super::*;

    fn request(method: Method, path: &str) -> Request<Bytes> {
        let url = url::Url::parse("http://localhost")
            .and_then(|base| base.join(path))
            .expect("valid URL");
        Request::builder(method, url).build()
    }

    /// Answers `status` with the call number as body: "1", "2", ...
    #[derive(Clone)]
    struct Counting {
        calls: Arc<AtomicU16>,
        status: u16,
    }

    impl Counting {
        fn new(status: u16) -> Self {
            Self {
                calls: Arc::new(AtomicU16::new(0)),
                status,
            }
        }

        fn calls(&self) -> u16 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Service<Request<Bytes>> for Counting {
        type Response = Response<Bytes>;
        type Error = Error;
        type Future = std::future::Ready<Result<Response<Bytes>>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Bytes>) -> Self::Future {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(Ok(Response::new(
                self.status,
                HashMap::new(),
                Bytes::from(n.to_string()),
            )))
        }
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.lifetime, Duration::from_millis(300_000));
        assert_eq!(config.methods, Method::ALL.to_vec());
    }

    #[test]
    fn key_depends_on_every_request_part() {
        let base = cache_key(&request(Method::Get, "/a")).expect("key");
        assert_eq!(base, cache_key(&request(Method::Get, "/a")).expect("key"));
        assert_ne!(base, cache_key(&request(Method::Post, "/a")).expect("key"));
        assert_ne!(base, cache_key(&request(Method::Get, "/b")).expect("key"));

        let url = url::Url::parse("http://localhost/a").expect("valid URL");
        let with_header = Request::builder(Method::Get, url.clone())
            .header("X-Id", "1")
            .build();
        let with_body = Request::builder(Method::Get, url)
            .body(Bytes::from_static(b"x"))
            .build();
        assert_ne!(base, cache_key(&with_header).expect("key"));
        assert_ne!(base, cache_key(&with_body).expect("key"));
    }

    #[tokio::test(start_paused = true)]
    async fn serves_hits_until_the_lifetime_elapses() {
        let inner = Counting::new(200);
        let service = CacheLayer::new(CacheConfig::new().lifetime(Duration::from_secs(10)))
            .layer(inner.clone());

        let first = service.clone().oneshot(request(Method::Get, "/a")).await.expect("first");
        tokio::time::advance(Duration::from_secs(9)).await;
        let second = service.clone().oneshot(request(Method::Get, "/a")).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(inner.calls(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        let third = service.clone().oneshot(request(Method::Get, "/a")).await.expect("third");
        assert_eq!(third.body(), &Bytes::from("2"));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_timer_drops_the_entry() {
        let layer = CacheLayer::new(CacheConfig::new().lifetime(Duration::from_secs(1)));
        let store = layer.store().clone();
        let service = layer.layer(Counting::new(200));

        service.oneshot(request(Method::Get, "/a")).await.expect("call");
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failures_are_stored_like_any_response() {
        let inner = Counting::new(503);
        let service = CacheLayer::new(CacheConfig::new()).layer(inner.clone());

        for _ in 0..3 {
            let response = service
                .clone()
                .oneshot(request(Method::Get, "/a"))
                .await
                .expect("call");
            assert_eq!(response.status(), 503);
            assert_eq!(response.body(), &Bytes::from("1"));
        }
        assert_eq!(inner.calls(), 1);
    }

    #[tokio::test]
    async fn refetch_skips_the_lookup_and_refreshes_the_entry() {
        let inner = Counting::new(200);
        let service = CacheLayer::new(CacheConfig::new()).layer(inner.clone());

        service.clone().oneshot(request(Method::Get, "/a")).await.expect("first");
        let refetched = service
            .clone()
            .oneshot(request(Method::Get, "/a").into_refetch())
            .await
            .expect("refetch");
        assert_eq!(refetched.body(), &Bytes::from("2"));

        let cached = service.clone().oneshot(request(Method::Get, "/a")).await.expect("cached");
        assert_eq!(cached.body(), &Bytes::from("2"));
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn disabled_or_unlisted_methods_bypass_the_cache() {
        let inner = Counting::new(200);
        let service = CacheLayer::new(CacheConfig::disabled()).layer(inner.clone());
        service.clone().oneshot(request(Method::Get, "/a")).await.expect("first");
        service.clone().oneshot(request(Method::Get, "/a")).await.expect("second");
        assert_eq!(inner.calls(), 2);

        let inner = Counting::new(200);
        let service =
            CacheLayer::new(CacheConfig::new().methods([Method::Get])).layer(inner.clone());
        service.clone().oneshot(request(Method::Post, "/a")).await.expect("first");
        service.clone().oneshot(request(Method::Post, "/a")).await.expect("second");
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn clear_forces_a_new_call() {
        let inner = Counting::new(200);
        let layer = CacheLayer::new(CacheConfig::new());
        let store = layer.store().clone();
        let service = layer.layer(inner.clone());

        service.clone().oneshot(request(Method::Get, "/a")).await.expect("first");
        store.clear();
        service.clone().oneshot(request(Method::Get, "/a")).await.expect("second");
        assert_eq!(inner.calls(), 2);
    }
}
