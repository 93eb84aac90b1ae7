//! Core types and traits for the ferrule pipeline HTTP client.
//!
//! This crate provides the transport-agnostic building blocks:
//! - [`Method`] - HTTP method enum
//! - [`RequestConfig`] - per-call configuration threaded through before-transforms
//! - [`Request`] and [`RequestBuilder`] - resolved requests handed to the transport
//! - [`Response`] - raw transport result
//! - [`Body`] and [`BodySerializer`] - request payloads and their encoding
//! - [`Error`] and [`Result`] - Error handling
//! - [`Transport`] - the injectable HTTP execution capability
//! - [`resolve_url`] and [`to_query_suffix`] - URL plumbing

mod body;
mod endpoint;
mod error;
mod method;
pub mod prelude;
mod query;
mod request;
mod response;
mod transport;

pub use body::{
    Body, BodySerializer, ContentType, default_serialize, default_serializer, from_json, to_json,
};
pub use endpoint::{has_scheme, resolve_url};
pub use error::{Error, Result};
pub use method::Method;
pub use query::{encode_component, to_query_suffix};
pub use request::{Request, RequestBuilder, RequestConfig};
pub use response::Response;
pub use transport::Transport;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
