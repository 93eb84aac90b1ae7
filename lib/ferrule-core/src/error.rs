//! Error types for ferrule.
//!
//! HTTP status failures (4xx/5xx) are not errors here: they come back as
//! ordinary [`Response`](crate::Response) values whose
//! [`is_success`](crate::Response::is_success) is `false`.

use derive_more::{Display, Error, From};

/// Main error type for ferrule operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// A step name was removed from a registry that does not contain it.
    ///
    /// Only raised in strict removal mode.
    #[display("step '{name}' is not registered in this client")]
    #[from(skip)]
    NotRegistered {
        /// Name that was looked up.
        name: String,
    },

    /// A before- or after-transform aborted the call.
    #[display("step '{step}' aborted: {message}")]
    #[from(skip)]
    Transform {
        /// Name of the failing step.
        step: String,
        /// Failure description.
        message: String,
    },

    /// A step received a pipeline value of a type it does not accept.
    #[display("step '{step}' expected a value of type `{expected}`")]
    #[from(skip)]
    UnexpectedPayload {
        /// Name of the step (or `<result>` for the final downcast).
        step: String,
        /// Type name the step expected.
        expected: &'static str,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// The response carries no `Content-Type` header.
    #[display("missing Content-Type header")]
    #[from(skip)]
    MissingContentType,

    /// The response `Content-Type` cannot be decoded.
    #[display("unsupported Content-Type: {_0}")]
    #[from(skip)]
    UnsupportedContentType(#[error(not(source))] String),

    /// A response body is not valid UTF-8 text.
    #[display("invalid text body: {_0}")]
    #[from]
    InvalidText(std::string::FromUtf8Error),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a not-registered error for a step name.
    #[must_use]
    pub fn not_registered(name: impl Into<String>) -> Self {
        Self::NotRegistered { name: name.into() }
    }

    /// Create a transform failure raised by a step.
    #[must_use]
    pub fn transform(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transform {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected payload error.
    #[must_use]
    pub fn unexpected_payload(step: impl Into<String>, expected: &'static str) -> Self {
        Self::UnexpectedPayload {
            step: step.into(),
            expected,
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not-registered error.
    #[must_use]
    pub const fn is_not_registered(&self) -> bool {
        matches!(self, Self::NotRegistered { .. })
    }

    /// Returns `true` if a step aborted the call.
    #[must_use]
    pub const fn is_transform(&self) -> bool {
        matches!(self, Self::Transform { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Name of the step involved, for step-level failures.
    #[must_use]
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Transform { step, .. } | Self::UnexpectedPayload { step, .. } => Some(step),
            Self::NotRegistered { name } => Some(name),
            _ => None,
        }
    }
}
