//! HTTP client with a composable before/after transform pipeline.
//!
//! Every call goes through an ordered list of named [`Step`]s. Before the
//! transport call, their before-transforms reshape the outgoing
//! [`RequestConfig`]. After it, their after-transforms fold the raw
//! [`Response`] into whatever the last step produces: a parsed body, an
//! [`Envelope`](steps::Envelope), a retried response...
//!
//! # Example
//!
//! ```no_run
//! use ferrule::steps::{camel_case, json, retry};
//! use ferrule::{Client, RequestConfig};
//! use serde_json::Value;
//!
//! # async fn run() -> ferrule::Result<()> {
//! let client = Client::builder()
//!     .base_url("https://jsonplaceholder.typicode.com")
//!     .step(retry(2))
//!     .step(json::<Value>())
//!     .step(camel_case())
//!     .build()?;
//!
//! let users: Value = client.get("/users", None).await?;
//!
//! // Same call, without the key rewrite
//! let raw: Value = client
//!     .get("/users", Some(&RequestConfig::new().exclude("camel-case")))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Non-2xx statuses are not errors: they reach the after-chain as ordinary
//! responses. Errors are reserved for transport failures and for steps that
//! abort the call.

mod client;
mod config;
pub mod middleware;
pub mod pipeline;
pub mod prelude;
mod registry;
mod step;
pub mod steps;
mod transport;

pub use client::{BoxedService, Client, ClientBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use registry::{Registry, RemovalMode};
pub use step::{AnyStep, Payload, Refetch, Step, StepContext, StepInfo};
pub use transport::HyperTransport;

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use ferrule_core::{
    Body, BodySerializer, ContentType, Error, Method, Request, RequestBuilder, RequestConfig,
    Response, Result, Transport, default_serialize, default_serializer, encode_component,
    from_json, has_scheme, resolve_url, to_json, to_query_suffix,
};

// Re-export http types for status codes and headers
pub use ferrule_core::{StatusCode, header};
