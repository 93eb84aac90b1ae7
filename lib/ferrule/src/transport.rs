//! The default [`Transport`]: hyper-util's pooled client over rustls.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tracing::trace;

use crate::{ClientConfig, Error, Request, Response, Result, Transport};

/// HTTP(S) transport with connection pooling and TLS.
///
/// Non-2xx responses come back as ordinary [`Response`]s. Only connection,
/// TLS, and timeout failures are errors.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Create a transport with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a transport with the given settings.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .retry_canceled_requests(config.retry_canceled_requests)
            .build(Self::connector(&config));

        Self { inner, config }
    }

    /// Transport settings.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// HTTP/1.1 and HTTP/2 connector trusting the Mozilla root certificates.
    fn connector(config: &ClientConfig) -> HttpsConnector<HttpConnector> {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(config.connect_timeout));
        http.enforce_http(false);

        let root_store: rustls::RootCertStore =
            webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();
        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http)
    }

    fn build_hyper_request(request: Request<Bytes>) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();

        if err.is_connect() {
            return Error::connection(msg);
        }
        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }
        Error::connection(msg)
    }
}

impl Transport for HyperTransport {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let timeout = request.timeout().unwrap_or(self.config.timeout);
        trace!(method = %request.method(), url = %request.url(), ?timeout, "executing transport call");
        let hyper_request = Self::build_hyper_request(request)?;

        let response = tokio::time::timeout(timeout, self.inner.request(hyper_request))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(response.headers());
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Method;

    #[test]
    fn keeps_its_config() {
        let config = ClientConfig::builder()
            .timeout(Duration::from_secs(5))
            .build();
        let transport = HyperTransport::with_config(config.clone());
        assert_eq!(transport.config(), &config);
        assert!(format!("{transport:?}").contains("HyperTransport"));
    }

    #[test]
    fn hyper_request_carries_method_headers_and_body() {
        let url = url::Url::parse("http://localhost:8080/users?page=2").expect("valid URL");
        let request = Request::builder(Method::Patch, url)
            .header("X-Id", "7")
            .body(Bytes::from_static(b"{}"))
            .build();

        let hyper_request = HyperTransport::build_hyper_request(request).expect("request");
        assert_eq!(hyper_request.method(), http::Method::PATCH);
        assert_eq!(hyper_request.uri(), "http://localhost:8080/users?page=2");
        assert_eq!(
            hyper_request.headers().get("X-Id").and_then(|v| v.to_str().ok()),
            Some("7")
        );
    }

    #[test]
    fn invalid_header_is_rejected() {
        let url = url::Url::parse("http://localhost/").expect("valid URL");
        let request = Request::<Bytes>::builder(Method::Get, url)
            .header("Bad Header", "x")
            .build();

        let err = HyperTransport::build_hyper_request(request).expect_err("invalid");
        assert!(matches!(err, Error::InvalidRequest(_)));
    }
}
