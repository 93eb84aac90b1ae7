//! Outgoing requests and per-call configuration.
//!
//! [`RequestConfig`] is what callers and before-transforms work with.
//! [`Request`] is what the transport receives once the before-chain is done.
//!
//! # Example
//!
//! ```
//! use ferrule_core::RequestConfig;
//!
//! let config = RequestConfig::new()
//!     .header("X-Request-Id", "abc")
//!     .query("page", 2)
//!     .exclude("json");
//!
//! assert!(config.is_excluded("json"));
//! assert_eq!(config.header_value("X-Request-Id"), Some("abc"));
//! ```

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bytes::Bytes;

use crate::{BodySerializer, Method};

/// Per-call request configuration threaded through the before-chain.
///
/// Cloning is deep for every field except the optional serializer, which is
/// a shared function pointer.
#[derive(Clone, Default)]
pub struct RequestConfig {
    /// Headers for this call; they override the client defaults.
    pub headers: HashMap<String, String>,
    /// Query parameters, encoded in insertion order.
    pub query: Vec<(String, String)>,
    /// Names of steps to skip for this call.
    pub exclude: HashSet<String>,
    /// Transport timeout for this call.
    pub timeout: Option<Duration>,
    /// Body serializer overriding the client's for this call.
    pub serializer: Option<BodySerializer>,
}

impl RequestConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any header with the same name in any case.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Skips the named step for this call.
    #[must_use]
    pub fn exclude(mut self, step: impl Into<String>) -> Self {
        self.exclude.insert(step.into());
        self
    }

    /// Sets the transport timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides the body serializer.
    #[must_use]
    pub fn serializer(mut self, serializer: BodySerializer) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Returns `true` if the named step must not run.
    #[must_use]
    pub fn is_excluded(&self, step: &str) -> bool {
        self.exclude.contains(step)
    }

    /// Single header value by name, case-insensitive.
    #[must_use]
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

impl std::fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestConfig")
            .field("headers", &self.headers)
            .field("query", &self.query)
            .field("exclude", &self.exclude)
            .field("timeout", &self.timeout)
            .field("serializer", &self.serializer.is_some())
            .finish()
    }
}

impl PartialEq for RequestConfig {
    fn eq(&self, other: &Self) -> bool {
        let same_serializer = match (&self.serializer, &other.serializer) {
            (None, None) => true,
            (Some(a), Some(b)) => std::sync::Arc::ptr_eq(a, b),
            _ => false,
        };
        same_serializer
            && self.headers == other.headers
            && self.query == other.query
            && self.exclude == other.exclude
            && self.timeout == other.timeout
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// A fully resolved HTTP request as handed to the transport.
#[derive(Debug, Clone)]
pub struct Request<B = Bytes> {
    method: Method,
    url: url::Url,
    headers: HashMap<String, String>,
    body: Option<B>,
    timeout: Option<Duration>,
    refetch: bool,
}

impl<B> Request<B> {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: url::Url) -> RequestBuilder<B> {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// Single header value by name, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&B> {
        self.body.as_ref()
    }

    /// Per-request timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Returns `true` if this request re-issues one that already got an answer.
    ///
    /// Caches must not answer a refetch from a stored response.
    #[must_use]
    pub const fn is_refetch(&self) -> bool {
        self.refetch
    }

    /// Marks this request as a refetch.
    #[must_use]
    pub fn into_refetch(mut self) -> Self {
        self.refetch = true;
        self
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, url::Url, HashMap<String, String>, Option<B>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder<B = Bytes> {
    method: Method,
    url: url::Url,
    headers: HashMap<String, String>,
    body: Option<B>,
    timeout: Option<Duration>,
}

impl<B> RequestBuilder<B> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets multiple headers; later values win.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets a header only if no header with that name (any case) exists.
    #[must_use]
    pub fn default_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let present = self.headers.keys().any(|k| k.eq_ignore_ascii_case(name));
        if !present {
            self.headers.insert(name.to_string(), value.into());
        }
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: B) -> Self {
        self.body = Some(body);
        self
    }

    /// Sets an optional request body.
    #[must_use]
    pub fn maybe_body(mut self, body: Option<B>) -> Self {
        self.body = body;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request<B> {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout: self.timeout,
            refetch: false,
        }
    }
}
