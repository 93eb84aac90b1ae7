//! Prelude module for convenient imports.
//!
//! ```
//! use ferrule::prelude::*;
//! ```

pub use crate::steps::{Envelope, json, json_envelope, retry};
pub use crate::{
    Body, Client, ClientBuilder, Error, Method, RemovalMode, RequestConfig, Response, Result, Step,
    StepContext, Transport,
};
pub use serde::{Deserialize, Serialize};
