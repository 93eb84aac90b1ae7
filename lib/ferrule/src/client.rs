//! The pipeline client.
//!
//! A call runs in four stages:
//!
//! 1. the before-chain reshapes a clone of the caller's [`RequestConfig`],
//! 2. the URL, headers and body are resolved into a [`Request`],
//! 3. the transport service (with its tower layers) executes it,
//! 4. the after-chain folds the raw [`Response`] into the output type.
//!
//! Handles obtained through [`Client::register_step`], [`Client::copy`] or
//! `clone` share one step registry, one cache, and one transport: editing
//! the steps through any of them is visible through all of them. Each call
//! works on a snapshot of the steps taken when it starts.

use std::any::type_name;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use tower_service::Service;
use tracing::debug;

use crate::config::ClientConfigBuilder;
use crate::middleware::{CacheConfig, CacheLayer, CacheStore, TimingLayer};
use crate::{
    AnyStep, Body, BodySerializer, Error, HyperTransport, Method, Refetch, Registry, RemovalMode,
    Request, RequestConfig, Response, Result, Step, StepContext, StepInfo, Transport,
    default_serializer, pipeline, resolve_url, to_query_suffix,
};

/// Type-erased transport service the tower layers are stacked on.
pub type BoxedService = BoxCloneService<Request<Bytes>, Response<Bytes>, Error>;

/// Future returned by the transport service.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response<Bytes>>> + Send + 'static>>;

/// Makes a [`BoxedService`] shareable across threads.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request<Bytes>) -> ServiceFuture {
        // Clone under the lock, call outside of it
        let service = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        Box::pin(service.oneshot(request))
    }
}

/// Adapts a [`Transport`] into the innermost tower service.
struct TransportService<T>(Arc<T>);

impl<T> Clone for TransportService<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Transport> Service<Request<Bytes>> for TransportService<T> {
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let transport = Arc::clone(&self.0);
        Box::pin(async move { transport.execute(request).await })
    }
}

fn transport_service<T: Transport>(transport: T) -> BoxedService {
    BoxCloneService::new(TransportService(Arc::new(transport)))
}

struct Shared {
    registry: RwLock<Registry>,
    base_url: Option<String>,
    headers: HashMap<String, String>,
    serializer: BodySerializer,
    service: SyncService,
    cache: Option<CacheStore>,
}

/// HTTP client running every call through a step pipeline.
///
/// `Out` is what a call returns once every after-transform has run. It starts
/// as [`Response<Bytes>`] and changes with each step registered through
/// [`ClientBuilder::step`] or [`Client::register_step`].
///
/// # Example
///
/// ```no_run
/// use ferrule::steps::json_envelope;
/// use ferrule::{Client, RequestConfig};
/// use serde_json::Value;
///
/// # async fn run() -> ferrule::Result<()> {
/// let client = Client::builder()
///     .base_url("https://jsonplaceholder.typicode.com")
///     .header("Accept", "application/json")
///     .build()?
///     .register_step(json_envelope::<Value>());
///
/// let todo = client
///     .get("/todos/1", Some(&RequestConfig::new().query("lang", "en")))
///     .await?;
/// assert_eq!(todo.status, 200);
/// # Ok(())
/// # }
/// ```
pub struct Client<Out = Response<Bytes>> {
    shared: Arc<Shared>,
    _marker: PhantomData<fn() -> Out>,
}

impl<Out> Clone for Client<Out> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _marker: PhantomData,
        }
    }
}

impl<Out> std::fmt::Debug for Client<Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.shared.base_url)
            .field("headers", &self.shared.headers)
            .field("steps", &self.list_steps())
            .field("cache", &self.shared.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }
}

impl<Out> Client<Out> {
    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Base endpoint relative paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.shared.base_url.as_deref()
    }

    /// Headers sent with every call.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.shared.headers
    }

    /// Removal mode of the shared registry.
    #[must_use]
    pub fn removal_mode(&self) -> RemovalMode {
        self.read_registry().mode()
    }

    /// Append `step` to the shared registry.
    ///
    /// The returned handle yields the step's output type; `self` keeps
    /// yielding `Out` but sees the new step as well.
    #[must_use]
    pub fn register_step<Next>(&self, step: Step<Out, Next>) -> Client<Next> {
        self.write_registry().register(step);
        Client {
            shared: Arc::clone(&self.shared),
            _marker: PhantomData,
        }
    }

    /// Remove every step called `name`.
    ///
    /// # Errors
    ///
    /// [`Error::NotRegistered`] in [`RemovalMode::Strict`] when no step has
    /// that name.
    pub fn remove_step(&self, name: &str) -> Result<()> {
        self.write_registry().remove(Some(name))
    }

    /// Remove every step.
    pub fn clear_steps(&self) {
        self.write_registry().clear();
    }

    /// Names of the registered steps, in execution order.
    #[must_use]
    pub fn list_steps(&self) -> Vec<StepInfo> {
        self.read_registry().list()
    }

    /// Another handle over the same registry, cache and transport.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Drop every cached response. No-op without a cache.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.shared.cache {
            cache.clear();
        }
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        body: &Body,
        config: Option<&RequestConfig>,
    ) -> Result<Request<Bytes>> {
        let query = config
            .map(|c| to_query_suffix(c.query.iter().map(|(k, v)| (k, v))))
            .unwrap_or_default();
        let url = resolve_url(self.base_url(), path, &query)?;

        let mut headers = self.shared.headers.clone();
        if let Some(config) = config {
            for (name, value) in &config.headers {
                headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
                headers.insert(name.clone(), value.clone());
            }
        }

        let serializer = config
            .and_then(|c| c.serializer.as_ref())
            .unwrap_or(&self.shared.serializer);
        let payload = serializer(body)?;

        let mut builder = Request::builder(method, url)
            .headers(headers)
            .timeout(config.and_then(|c| c.timeout));
        if let (Some(_), Some(content_type)) = (&payload, body.content_type()) {
            builder = builder.default_header("Content-Type", content_type.as_str());
        }

        Ok(builder.maybe_body(payload).build())
    }

    /// Issue a call and downcast the pipeline result to `R`.
    ///
    /// `config` is cloned before the before-chain runs; the caller's value is
    /// never modified. The before-chain honours the caller's exclusion set,
    /// the after-chain the one the before-chain produced. A refetch issued by
    /// an after-step is never answered from the cache.
    ///
    /// # Errors
    ///
    /// - the error of a failing before- or after-transform, unchanged
    /// - transport errors (connection, TLS, timeout)
    /// - [`Error::InvalidUrl`] if the URL does not resolve
    /// - [`Error::UnexpectedPayload`] if the result is not an `R`
    pub async fn send<R>(
        &self,
        method: Method,
        url: &str,
        body: Body,
        config: Option<&RequestConfig>,
    ) -> Result<R>
    where
        R: Send + 'static,
    {
        let steps: Vec<AnyStep> = self.read_registry().snapshot();
        debug!(%method, url, steps = steps.len(), "sending");

        let config = pipeline::run_before(&steps, config.cloned()).await?;
        let exclude = config
            .as_ref()
            .map(|c| c.exclude.clone())
            .unwrap_or_default();
        let request = self.build_request(method, url, &body, config.as_ref())?;

        let service = self.shared.service.clone();
        let again = request.clone().into_refetch();
        let raw = service.call(request).await?;

        let refetch = Refetch::new(move || service.call(again.clone()));
        let cx = StepContext::new(refetch, config.map(Arc::new));
        let out = pipeline::run_after(&steps, Box::new(raw), &exclude, &cx).await?;

        out.downcast::<R>()
            .map(|out| *out)
            .map_err(|_| Error::unexpected_payload("<result>", type_name::<R>()))
    }
}

impl<Out: Send + 'static> Client<Out> {
    /// `GET url`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn get(&self, url: &str, config: Option<&RequestConfig>) -> Result<Out> {
        self.send(Method::Get, url, Body::Empty, config).await
    }

    /// `DELETE url`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn delete(&self, url: &str, config: Option<&RequestConfig>) -> Result<Out> {
        self.send(Method::Delete, url, Body::Empty, config).await
    }

    /// `POST url` with `body`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn post(
        &self,
        url: &str,
        body: impl Into<Body>,
        config: Option<&RequestConfig>,
    ) -> Result<Out> {
        self.send(Method::Post, url, body.into(), config).await
    }

    /// `PUT url` with `body`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn put(
        &self,
        url: &str,
        body: impl Into<Body>,
        config: Option<&RequestConfig>,
    ) -> Result<Out> {
        self.send(Method::Put, url, body.into(), config).await
    }

    /// `PATCH url` with `body`.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub async fn patch(
        &self,
        url: &str,
        body: impl Into<Body>,
        config: Option<&RequestConfig>,
    ) -> Result<Out> {
        self.send(Method::Patch, url, body.into(), config).await
    }
}

type LayerFn = Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>;

/// Builder for [`Client`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ferrule::steps::{json, retry};
/// use ferrule::{Client, RemovalMode};
/// use serde_json::Value;
///
/// let client = Client::builder()
///     .base_url("https://api.example.com/v1")
///     .header("Authorization", "Bearer token")
///     .timeout(Duration::from_secs(5))
///     .removal_mode(RemovalMode::Lenient)
///     .step(retry(3))
///     .step(json::<Value>())
///     .build()
///     .expect("valid base URL");
///
/// assert_eq!(client.list_steps().len(), 2);
/// ```
pub struct ClientBuilder<Out = Response<Bytes>> {
    base_url: Option<String>,
    headers: HashMap<String, String>,
    steps: Vec<AnyStep>,
    serializer: Option<BodySerializer>,
    removal_mode: RemovalMode,
    transport: Option<BoxedService>,
    config: ClientConfigBuilder,
    layers: Vec<LayerFn>,
    cache: Option<CacheStore>,
    _marker: PhantomData<fn() -> Out>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: HashMap::new(),
            steps: Vec::new(),
            serializer: None,
            removal_mode: RemovalMode::default(),
            transport: None,
            config: ClientConfigBuilder::default(),
            layers: Vec::new(),
            cache: None,
            _marker: PhantomData,
        }
    }
}

impl<Out> std::fmt::Debug for ClientBuilder<Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("steps", &self.steps)
            .field("removal_mode", &self.removal_mode)
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

impl<Out> ClientBuilder<Out> {
    /// Set the base endpoint.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Add a header sent with every call.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add headers sent with every call.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Register an initial step.
    #[must_use]
    pub fn step<Next>(mut self, step: Step<Out, Next>) -> ClientBuilder<Next> {
        self.steps.push(step.erase());
        ClientBuilder {
            base_url: self.base_url,
            headers: self.headers,
            steps: self.steps,
            serializer: self.serializer,
            removal_mode: self.removal_mode,
            transport: self.transport,
            config: self.config,
            layers: self.layers,
            cache: self.cache,
            _marker: PhantomData,
        }
    }

    /// Replace the default body serializer.
    #[must_use]
    pub fn serializer(mut self, serializer: BodySerializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// How removing an unknown step name is treated.
    #[must_use]
    pub const fn removal_mode(mut self, mode: RemovalMode) -> Self {
        self.removal_mode = mode;
        self
    }

    /// Use `transport` instead of the built-in [`HyperTransport`].
    ///
    /// The hyper settings below are then ignored.
    #[must_use]
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(transport_service(transport));
        self
    }

    // ========================================================================
    // HyperTransport settings
    // ========================================================================

    /// Set the default transport timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    // ========================================================================
    // Tower layers
    // ========================================================================

    /// Wrap the transport in a tower layer.
    ///
    /// Layers wrap in the order they are added: the last one added sees the
    /// call first.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request<Bytes>, Response = Response<Bytes>, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<Request<Bytes>>>::Future: Send,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Cache responses; see [`CacheLayer`].
    #[must_use]
    pub fn with_cache(mut self, config: CacheConfig) -> Self {
        let store = CacheStore::new();
        self.cache = Some(store.clone());
        self.layer(CacheLayer::with_store(config, store))
    }

    /// Report call durations; see [`TimingLayer`].
    #[must_use]
    pub fn with_timing(self) -> Self {
        self.layer(TimingLayer::new())
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidUrl`] if the base endpoint is not an absolute URL.
    pub fn build(self) -> Result<Client<Out>> {
        if let Some(base_url) = &self.base_url {
            url::Url::parse(base_url)?;
        }

        let config = self.config.build();
        let mut service = self
            .transport
            .unwrap_or_else(|| transport_service(HyperTransport::with_config(config)));
        for layer_fn in self.layers {
            service = layer_fn(service);
        }

        let mut registry = Registry::new(self.removal_mode);
        for step in self.steps {
            registry.register(step);
        }

        Ok(Client {
            shared: Arc::new(Shared {
                registry: RwLock::new(registry),
                base_url: self.base_url,
                headers: self.headers,
                serializer: self.serializer.unwrap_or_else(default_serializer),
                service: SyncService::new(service),
                cache: self.cache,
            }),
            _marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;

    /// Records requests and answers with a fixed status.
    #[derive(Clone, Default)]
    struct Recorder {
        seen: Arc<StdMutex<Vec<Request<Bytes>>>>,
    }

    impl Recorder {
        fn requests(&self) -> Vec<Request<Bytes>> {
            self.seen.lock().expect("lock").clone()
        }
    }

    impl Transport for Recorder {
        async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
            self.seen.lock().expect("lock").push(request);
            Ok(Response::new(200, HashMap::new(), Bytes::from("ok")))
        }
    }

    fn client(recorder: &Recorder) -> Client {
        Client::builder()
            .base_url("https://api.example.com/v1")
            .header("Accept", "application/json")
            .header("X-Client", "ferrule")
            .removal_mode(RemovalMode::Strict)
            .transport(recorder.clone())
            .build()
            .expect("client")
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = Client::builder()
            .base_url("not a url")
            .transport(Recorder::default())
            .build();
        let_assert!(Err(Error::InvalidUrl(_)) = result);
    }

    #[tokio::test]
    async fn request_merges_base_headers_query_and_body() {
        let recorder = Recorder::default();
        let config = RequestConfig::new()
            .header("ACCEPT", "text/html")
            .header("accept", "text/plain")
            .query("page", 2)
            .query("q", "a b")
            .timeout(Duration::from_secs(3));

        let response = client(&recorder)
            .post("/users", Body::Json(json!({"name": "Ada"})), Some(&config))
            .await
            .expect("call");
        check!(response.status() == 200);

        let requests = recorder.requests();
        let_assert!([request] = requests.as_slice());
        check!(request.method() == Method::Post);
        check!(request.url().as_str() == "https://api.example.com/v1/users?page=2&q=a%20b");
        check!(request.header("Accept") == Some("text/plain"));
        let accepts = request
            .headers()
            .keys()
            .filter(|name| name.eq_ignore_ascii_case("accept"))
            .count();
        check!(accepts == 1);
        check!(request.header("X-Client") == Some("ferrule"));
        check!(request.header("Content-Type") == Some("application/json"));
        check!(request.timeout() == Some(Duration::from_secs(3)));
        check!(request.body() == Some(&Bytes::from(r#"{"name":"Ada"}"#)));
    }

    #[tokio::test]
    async fn empty_body_sends_no_content_type() {
        let recorder = Recorder::default();
        client(&recorder).get("/users", None).await.expect("call");

        let requests = recorder.requests();
        let_assert!([request] = requests.as_slice());
        check!(request.body().is_none());
        check!(request.header("Content-Type").is_none());
    }

    #[tokio::test]
    async fn serializer_override_per_call() {
        let recorder = Recorder::default();
        let shout: BodySerializer = Arc::new(|_body: &Body| Ok(Some(Bytes::from("HELLO"))));
        let config = RequestConfig::new().serializer(shout);

        client(&recorder)
            .put("/greeting", "hello", Some(&config))
            .await
            .expect("call");

        let requests = recorder.requests();
        let_assert!([request] = requests.as_slice());
        check!(request.body() == Some(&Bytes::from("HELLO")));
        check!(request.header("Content-Type") == Some("text/plain;charset=UTF-8"));
    }

    #[tokio::test]
    async fn register_step_shares_the_registry() {
        let recorder = Recorder::default();
        let base = client(&recorder);
        let typed = base.register_step(
            Step::new("status").after(|r: Response<Bytes>| async move { Ok(r.status()) }),
        );
        let copy = base.copy();

        check!(base.list_steps() == typed.list_steps());
        check!(copy.list_steps().len() == 1);
        check!(typed.get("/x", None).await.expect("call") == 200);

        copy.remove_step("status").expect("remove");
        check!(typed.list_steps().is_empty());
        let_assert!(Ok(response) = typed.send::<Response<Bytes>>(Method::Get, "/x", Body::Empty, None).await);
        check!(response.body() == &Bytes::from("ok"));
    }

    #[tokio::test]
    async fn stale_typed_handle_reports_the_mismatch() {
        let recorder = Recorder::default();
        let typed = client(&recorder).register_step(
            Step::new("status").after(|r: Response<Bytes>| async move { Ok(r.status()) }),
        );
        typed.clear_steps();

        let_assert!(Err(Error::UnexpectedPayload { step, expected }) = typed.get("/x", None).await);
        check!(step == "<result>");
        check!(expected == "u16");
    }

    #[tokio::test]
    async fn strict_removal_of_unknown_step_fails() {
        let recorder = Recorder::default();
        let client = client(&recorder);
        check!(client.removal_mode() == RemovalMode::Strict);
        let_assert!(Err(err) = client.remove_step("missing"));
        check!(err.is_not_registered());
    }

    #[test]
    fn debug_lists_steps_not_functions() {
        let client = client(&Recorder::default())
            .register_step(Step::<Response<Bytes>>::new("noop"));
        let debug = format!("{client:?}");
        check!(debug.contains("noop"));
        check!(debug.contains("api.example.com"));
    }
}
