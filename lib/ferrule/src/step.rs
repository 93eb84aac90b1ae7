//! Pipeline steps.
//!
//! A [`Step`] is a named unit with an optional before-transform (reshapes the
//! outgoing [`RequestConfig`]) and an optional after-transform (reshapes the
//! value produced by the previous step). Steps are typed while you build them
//! and erased into an [`AnyStep`] when they are registered.
//!
//! # Example
//!
//! ```
//! use ferrule::{Response, Step};
//! use bytes::Bytes;
//!
//! let step = Step::<Response<Bytes>>::new("status")
//!     .before(|config| async move { Ok(config.header("X-Trace", "1")) })
//!     .after(|response: Response<Bytes>| async move { Ok(response.status()) });
//!
//! assert_eq!(step.name(), "status");
//! ```

use std::any::{Any, type_name};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt};

use crate::{Error, RequestConfig, Response, Result};

/// The opaque value threaded through the after-chain.
pub type Payload = Box<dyn Any + Send>;

type BeforeFn =
    Arc<dyn Fn(RequestConfig) -> BoxFuture<'static, Result<RequestConfig>> + Send + Sync>;
type AfterFn =
    Arc<dyn Fn(Payload, StepContext) -> BoxFuture<'static, Result<Payload>> + Send + Sync>;
type RefetchFn = dyn Fn() -> BoxFuture<'static, Result<Response<Bytes>>> + Send + Sync;

/// Re-issues the current call's transport request.
///
/// The request is the one produced by the before-chain; the before-chain does
/// not run again.
#[derive(Clone)]
pub struct Refetch(Arc<RefetchFn>);

impl Refetch {
    /// Wrap a function that performs the transport call.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<Bytes>>> + Send + 'static,
    {
        Self(Arc::new(move || f().boxed()))
    }

    /// Run the transport call again.
    ///
    /// # Errors
    ///
    /// Returns the transport's error unchanged.
    pub async fn call(&self) -> Result<Response<Bytes>> {
        (self.0)().await
    }
}

impl std::fmt::Debug for Refetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Refetch").finish_non_exhaustive()
    }
}

/// What an after-transform can see besides its input value.
#[derive(Debug, Clone, Default)]
pub struct StepContext {
    refetch: Option<Refetch>,
    config: Option<Arc<RequestConfig>>,
}

impl StepContext {
    /// A context with no client behind it: no refetch, no configuration.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// A context for a call issued by a client.
    #[must_use]
    pub fn new(refetch: Refetch, config: Option<Arc<RequestConfig>>) -> Self {
        Self {
            refetch: Some(refetch),
            config,
        }
    }

    /// The refetch capability, when running inside a client call.
    #[must_use]
    pub const fn refetch(&self) -> Option<&Refetch> {
        self.refetch.as_ref()
    }

    /// The configuration produced by the before-chain, if the call had one.
    #[must_use]
    pub fn config(&self) -> Option<&RequestConfig> {
        self.config.as_deref()
    }
}

/// A typed pipeline step taking `I` on the after side and producing `O`.
///
/// A step without any transform is legal and does nothing.
pub struct Step<I, O = I> {
    name: Arc<str>,
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I> Step<I, I> {
    /// Creates an inert step.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            before: None,
            after: None,
            _marker: PhantomData,
        }
    }
}

impl<I, O> Step<I, O> {
    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the before-transform.
    #[must_use]
    pub fn before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<RequestConfig>> + Send + 'static,
    {
        self.before = Some(Arc::new(move |config: RequestConfig| f(config).boxed()));
        self
    }

    /// Sets the after-transform.
    #[must_use]
    pub fn after<O2, F, Fut>(self, f: F) -> Step<I, O2>
    where
        I: Send + 'static,
        O2: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O2>> + Send + 'static,
    {
        self.after_with_context(move |input, _cx| f(input))
    }

    /// Sets the after-transform, giving it access to the [`StepContext`].
    #[must_use]
    pub fn after_with_context<O2, F, Fut>(self, f: F) -> Step<I, O2>
    where
        I: Send + 'static,
        O2: Send + 'static,
        F: Fn(I, StepContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O2>> + Send + 'static,
    {
        let name = Arc::clone(&self.name);
        let after: AfterFn = Arc::new(move |payload: Payload, cx: StepContext| {
            match payload.downcast::<I>() {
                Ok(input) => f(*input, cx)
                    .map(|output| output.map(|value| Box::new(value) as Payload))
                    .boxed(),
                Err(_) => future::ready(Err(Error::unexpected_payload(
                    name.as_ref(),
                    type_name::<I>(),
                )))
                .boxed(),
            }
        });

        Step {
            name: self.name,
            before: self.before,
            after: Some(after),
            _marker: PhantomData,
        }
    }

    /// Erase the value types.
    #[must_use]
    pub fn erase(self) -> AnyStep {
        AnyStep {
            name: self.name,
            before: self.before,
            after: self.after,
        }
    }
}

impl<I, O> std::fmt::Debug for Step<I, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// A registered step with its value types erased.
///
/// Cloning shares the transform functions.
#[derive(Clone)]
pub struct AnyStep {
    name: Arc<str>,
    before: Option<BeforeFn>,
    after: Option<AfterFn>,
}

impl AnyStep {
    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the step has a before-transform.
    #[must_use]
    pub const fn has_before(&self) -> bool {
        self.before.is_some()
    }

    /// Returns `true` if the step has an after-transform.
    #[must_use]
    pub const fn has_after(&self) -> bool {
        self.after.is_some()
    }

    /// Run the before-transform, or hand the config back untouched.
    pub(crate) async fn run_before(&self, config: RequestConfig) -> Result<RequestConfig> {
        match &self.before {
            Some(before) => before(config).await,
            None => Ok(config),
        }
    }

    /// Run the after-transform, or hand the value back untouched.
    pub(crate) async fn run_after(&self, payload: Payload, cx: StepContext) -> Result<Payload> {
        match &self.after {
            Some(after) => after(payload, cx).await,
            None => Ok(payload),
        }
    }
}

impl<I, O> From<Step<I, O>> for AnyStep {
    fn from(step: Step<I, O>) -> Self {
        step.erase()
    }
}

impl std::fmt::Debug for AnyStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyStep")
            .field("name", &self.name)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

/// Name-only view of a registered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepInfo {
    /// Step name.
    pub name: String,
}
