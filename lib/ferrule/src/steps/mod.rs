//! Ready-made steps.
//!
//! | Step | Name | Input → Output |
//! |------|------|----------------|
//! | [`retry`] | `retry` | `Response<Bytes>` → `Response<Bytes>` |
//! | [`json`] | `json` | `Response<Bytes>` → `T` |
//! | [`json_body`] | `json` | `Response<Bytes>` → `Response<T>` |
//! | [`envelope`] | `envelope` | `Response<T>` → [`Envelope<T>`] |
//! | [`json_envelope`] | `json-envelope` | `Response<Bytes>` → [`Envelope<T>`] |
//! | [`decode`] | `decode` | `Response<Bytes>` → `Response<`[`Decoded`]`>` |
//! | [`camel_case`] | `camel-case` | `serde_json::Value` → `serde_json::Value` |
//!
//! Order matters: each step receives what the previous one produced.
//!
//! # Example
//!
//! ```
//! use ferrule::Client;
//! use ferrule::steps::{camel_case, json, retry};
//! use serde_json::Value;
//!
//! let client = Client::builder()
//!     .base_url("https://jsonplaceholder.typicode.com")
//!     .step(retry(2))
//!     .step(json::<Value>())
//!     .step(camel_case())
//!     .build()
//!     .expect("valid base URL");
//!
//! let names: Vec<_> = client.list_steps().into_iter().map(|s| s.name).collect();
//! assert_eq!(names, ["retry", "json", "camel-case"]);
//! ```

mod case;
mod decode;
mod json;
mod retry;

pub use case::{camel_case, keys_to_camel_case, snake_to_camel};
pub use decode::{Decoded, decode, decode_body};
pub use json::{Envelope, envelope, json, json_body, json_envelope};
pub use retry::{RetryCoordinator, retry};
