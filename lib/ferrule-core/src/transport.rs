//! The transport capability the pipeline wraps.
//!
//! Implement [`Transport`] to plug in any HTTP implementation; the `ferrule`
//! crate ships a hyper-based one, and tests substitute in-memory stubs.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;

use crate::{Request, Response, Result};

/// Executes a resolved request and returns the raw response.
///
/// Implementations must not fail merely because of a non-2xx status: those
/// are returned as ordinary responses. Errors are reserved for transport
/// failures (connection, TLS, timeout).
pub trait Transport: Send + Sync + 'static {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be carried out:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send {
        (**self).execute(request)
    }
}
