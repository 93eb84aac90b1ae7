//! Call timing.
//!
//! Wraps the transport and reports how long each call took using `tracing`.
//! Failures are reported and handed back unchanged.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::{Error, Request, Response, Result};

/// Layer that times every transport call.
///
/// # Example
///
/// ```
/// use ferrule::Client;
/// use ferrule::middleware::TimingLayer;
///
/// let client = Client::builder()
///     .base_url("https://api.example.com")
///     .layer(TimingLayer::verbose())
///     .build();
/// assert!(client.is_ok());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingLayer {
    detail: Detail,
}

/// How much a [`Timing`] service reports about each call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Detail {
    /// Method, URL, status and duration at info level.
    #[default]
    Summary,
    /// Also the request headers, at debug level.
    Verbose,
}

impl TimingLayer {
    /// Summary timing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Timing that also reports request headers.
    #[must_use]
    pub fn verbose() -> Self {
        Self {
            detail: Detail::Verbose,
        }
    }
}

impl<S> Layer<S> for TimingLayer {
    type Service = Timing<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Timing {
            inner,
            detail: self.detail,
        }
    }
}

/// Service that times the calls of the service it wraps.
#[derive(Debug, Clone)]
pub struct Timing<S> {
    inner: S,
    detail: Detail,
}

impl<S> Service<Request<Bytes>> for Timing<S>
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
        let method = request.method();
        let url = request.url().to_string();
        let detail = self.detail;

        let span = span!(Level::INFO, "http_request", %method, %url);

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();
                match detail {
                    Detail::Verbose => {
                        debug!(headers = ?request.headers(), "call started");
                    }
                    Detail::Summary => info!("call started"),
                }

                let result = inner.call(request).await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => info!(status = response.status(), elapsed_ms, "call finished"),
                    Err(err) => warn!(error = %err, elapsed_ms, "call failed"),
                }

                result
            }
            .instrument(span),
        )
    }
}
