//! Prelude module for convenient imports.
//!
//! ```
//! use ferrule_core::prelude::*;
//! ```

pub use crate::{
    Body, ContentType, Error, Method, Request, RequestConfig, Response, Result, Transport,
};
