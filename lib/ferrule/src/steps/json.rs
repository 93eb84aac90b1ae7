//! JSON parsing steps and the [`Envelope`] wrapper.

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Response, Step};

/// A parsed body together with the status and headers it came with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Parsed body.
    pub data: T,
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
}

impl<T> From<Response<T>> for Envelope<T> {
    fn from(response: Response<T>) -> Self {
        let (status, headers, data) = response.into_parts();
        Self {
            data,
            status,
            headers,
        }
    }
}

/// `json`: parse the response body as JSON into `T`, dropping status and headers.
#[must_use]
pub fn json<T>() -> Step<Response<Bytes>, T>
where
    T: DeserializeOwned + Send + 'static,
{
    Step::new("json").after(|response: Response<Bytes>| async move { response.json::<T>() })
}

/// `json`: parse the response body as JSON, keeping status and headers.
///
/// Register [`envelope`] after it to get an [`Envelope`].
#[must_use]
pub fn json_body<T>() -> Step<Response<Bytes>, Response<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    Step::new("json").after(|response: Response<Bytes>| async move {
        let data = response.json::<T>()?;
        Ok(response.map_body(|_| data))
    })
}

/// `envelope`: wrap a response into an [`Envelope`].
#[must_use]
pub fn envelope<T>() -> Step<Response<T>, Envelope<T>>
where
    T: Send + 'static,
{
    Step::new("envelope").after(|response: Response<T>| async move { Ok(Envelope::from(response)) })
}

/// `json-envelope`: [`json_body`] and [`envelope`] in a single step.
#[must_use]
pub fn json_envelope<T>() -> Step<Response<Bytes>, Envelope<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    Step::new("json-envelope").after(|response: Response<Bytes>| async move {
        let data = response.json::<T>()?;
        Ok(Envelope::from(response.map_body(|_| data)))
    })
}
