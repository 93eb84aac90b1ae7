//! Tower layers wrapped around the transport.
//!
//! These wrap the transport call itself, below the step pipeline: a cached
//! response still runs through every after-transform, and a refetch issued by
//! a retry step goes through the same layers as the first call.
//!
//! # Available Layers
//!
//! - [`CacheLayer`] - serves repeated identical calls from a time-boxed store
//! - [`TimingLayer`] - reports the duration of every call with `tracing`
//!
//! Any other tower layer over `Request<Bytes>` / `Response<Bytes>` can be
//! added with [`ClientBuilder::layer`](crate::ClientBuilder::layer).
//!
//! # Example
//!
//! ```
//! use ferrule::Client;
//! use ferrule::middleware::CacheConfig;
//!
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .with_cache(CacheConfig::default())
//!     .with_timing()
//!     .build();
//! assert!(client.is_ok());
//! ```

mod cache;
mod timing;

pub use cache::{Cache, CacheConfig, CacheLayer, CacheStore, DEFAULT_CACHE_LIFETIME};
pub use timing::{Detail, Timing, TimingLayer};

pub use tower::{Layer, ServiceBuilder};
