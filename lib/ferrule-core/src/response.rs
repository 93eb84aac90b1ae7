//! HTTP response handling.
//!
//! A [`Response`] is the raw transport result that enters the after-chain.
//! Non-2xx statuses are data, not errors: check [`Response::is_success`].

use std::collections::HashMap;

use bytes::Bytes;

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<B = Bytes> {
    status: u16,
    headers: HashMap<String, String>,
    body: B,
}

impl<B> Response<B> {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name, ignoring ASCII case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| {
                self.headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, HashMap<String, String>, B) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx: the transport's success indicator.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Transform the body with a function.
    pub fn map_body<F, B2>(self, f: F) -> Response<B2>
    where
        F: FnOnce(B) -> B2,
    {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
        }
    }

    /// Transform the body with a fallible function.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`.
    pub fn try_map_body<F, B2, E>(self, f: F) -> Result<Response<B2>, E>
    where
        F: FnOnce(B) -> Result<B2, E>,
    {
        Ok(Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body)?,
        })
    }
}

impl Response<Bytes> {
    /// Deserialize the response body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> crate::Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_basic() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        let response = Response::new(201, headers, Bytes::from(r#"{"id":101}"#));

        assert_eq!(response.status(), 201);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert!(response.is_success());
        assert!(!response.is_client_error());
        assert!(!response.is_server_error());
    }

    #[test]
    fn response_status_checks() {
        let response = Response::new(404, HashMap::new(), Bytes::new());
        assert!(response.is_client_error());
        assert!(!response.is_success());

        let response = Response::new(500, HashMap::new(), Bytes::new());
        assert!(response.is_server_error());
        assert!(!response.is_success());
    }

    #[test]
    fn response_json() {
        #[derive(Debug, PartialEq, serde::Deserialize)]
        struct Created {
            id: u64,
        }

        let response = Response::new(201, HashMap::new(), Bytes::from(r#"{"id":101}"#));
        let created: Created = response.json().expect("deserialize");
        assert_eq!(created, Created { id: 101 });
    }

    #[test]
    fn response_text_rejects_invalid_utf8() {
        let response = Response::new(200, HashMap::new(), Bytes::from("Hello"));
        assert_eq!(response.text().expect("text"), "Hello");

        let response = Response::new(200, HashMap::new(), Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(response.text(), Err(crate::Error::InvalidText(_))));
    }

    #[test]
    fn response_map_body_keeps_status() {
        let response = Response::new(202, HashMap::new(), Bytes::from("test"));
        let mapped = response.map_body(|b| b.len());

        assert_eq!(mapped.status(), 202);
        assert_eq!(*mapped.body(), 4);
    }
}
