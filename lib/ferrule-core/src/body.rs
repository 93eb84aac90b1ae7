//! Request bodies and their serialization.
//!
//! A [`Body`] describes what the caller wants to send; a [`BodySerializer`]
//! turns it into transport-ready bytes. [`default_serialize`] passes binary,
//! text and form payloads through, writes JSON objects and arrays as JSON text
//! and stringifies JSON primitives.

use std::sync::Arc;

use bytes::Bytes;

use crate::Result;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// Plain text content type (`text/plain`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::FormUrlEncoded => "application/x-www-form-urlencoded",
            Self::PlainText => "text/plain;charset=UTF-8",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request body before serialization.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// Raw bytes, sent unmodified.
    Bytes(Bytes),
    /// Text, sent unmodified.
    Text(String),
    /// Form fields, sent URL-encoded in order.
    Form(Vec<(String, String)>),
    /// A JSON value.
    Json(serde_json::Value),
}

impl Body {
    /// Build a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Build a form body from any serializable struct or map.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be form-encoded.
    pub fn form<T: serde::Serialize>(value: &T) -> Result<Self> {
        let encoded = serde_html_form::to_string(value)?;
        let fields = url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect();
        Ok(Self::Form(fields))
    }

    /// Returns `true` if there is nothing to send.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty | Self::Json(serde_json::Value::Null))
    }

    /// Content type implied by the body kind, if any.
    #[must_use]
    pub const fn content_type(&self) -> Option<ContentType> {
        match self {
            Self::Empty | Self::Json(serde_json::Value::Null) => None,
            Self::Bytes(_) => Some(ContentType::OctetStream),
            Self::Text(_)
            | Self::Json(
                serde_json::Value::String(_)
                | serde_json::Value::Number(_)
                | serde_json::Value::Bool(_),
            ) => Some(ContentType::PlainText),
            Self::Form(_) => Some(ContentType::FormUrlEncoded),
            Self::Json(_) => Some(ContentType::Json),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<serde_json::Value> for Body {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

/// Turns a [`Body`] into the bytes handed to the transport.
///
/// `Ok(None)` means the request goes out without a body.
pub type BodySerializer = Arc<dyn Fn(&Body) -> Result<Option<Bytes>> + Send + Sync>;

/// The serializer used when neither the client nor the call overrides it.
///
/// # Errors
///
/// Returns an error if a JSON or form payload fails to encode.
pub fn default_serialize(body: &Body) -> Result<Option<Bytes>> {
    use serde_json::Value;

    let bytes = match body {
        Body::Empty | Body::Json(Value::Null) => return Ok(None),
        Body::Bytes(bytes) => bytes.clone(),
        Body::Text(text) => Bytes::from(text.clone()),
        Body::Form(fields) => Bytes::from(serde_html_form::to_string(fields)?),
        Body::Json(value @ (Value::Object(_) | Value::Array(_))) => to_json(value)?,
        Body::Json(Value::String(text)) => Bytes::from(text.clone()),
        Body::Json(primitive) => Bytes::from(primitive.to_string()),
    };
    Ok(Some(bytes))
}

/// [`default_serialize`] as a [`BodySerializer`].
#[must_use]
pub fn default_serializer() -> BodySerializer {
    Arc::new(default_serialize)
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use ferrule_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// # Errors
///
/// Returns an error if JSON deserialization fails, with the error message
/// including the path to the problematic field (e.g., "user.address.city").
///
/// # Example
///
/// ```
/// use ferrule_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let user: User = from_json(br#"{"name":"Alice"}"#).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}
