//! Content-type negotiated body decoding.
//!
//! | Content type | Result |
//! |---|---|
//! | contains `blob` or `octet-stream` | [`Decoded::Binary`] |
//! | contains `json` | [`Decoded::Json`] |
//! | contains `text` | [`Decoded::Text`] |
//! | anything else | [`Error::UnsupportedContentType`] |

use bytes::Bytes;
use serde_json::Value;

use crate::{Error, Response, Result, Step};

/// A response body decoded according to its `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// `*json*` content.
    Json(Value),
    /// `*text*` content.
    Text(String),
    /// `*blob*` and `application/octet-stream` content, untouched.
    Binary(Bytes),
}

impl Decoded {
    /// The JSON value, if the body was JSON.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// The text, if the body was text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Decode a body given its `Content-Type`.
///
/// Binary types are checked first, then JSON, then text.
///
/// # Errors
///
/// [`Error::MissingContentType`] without a content type,
/// [`Error::UnsupportedContentType`] for anything else not listed on
/// [`Decoded`], or the parse error of the chosen decoder.
pub fn decode_body(content_type: Option<&str>, body: Bytes) -> Result<Decoded> {
    let Some(content_type) = content_type else {
        return Err(Error::MissingContentType);
    };
    let lowered = content_type.to_ascii_lowercase();

    if lowered.contains("blob") || lowered.contains("octet-stream") {
        Ok(Decoded::Binary(body))
    } else if lowered.contains("json") {
        crate::from_json(&body).map(Decoded::Json)
    } else if lowered.contains("text") {
        Ok(Decoded::Text(String::from_utf8(body.to_vec())?))
    } else {
        Err(Error::UnsupportedContentType(content_type.to_string()))
    }
}

/// `decode`: decode the body by content type, keeping status and headers.
#[must_use]
pub fn decode() -> Step<Response<Bytes>, Response<Decoded>> {
    Step::new("decode").after(|response: Response<Bytes>| async move {
        let content_type = response.header("content-type").map(str::to_string);
        response.try_map_body(|body| decode_body(content_type.as_deref(), body))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert2::{check, let_assert};
    use serde_json::json;

    use super::*;

    #[test]
    fn picks_the_decoder_from_the_content_type() {
        let_assert!(
            Ok(Decoded::Json(value)) =
                decode_body(Some("application/json; charset=utf-8"), Bytes::from("[1,2]"))
        );
        check!(value == json!([1, 2]));

        let_assert!(Ok(Decoded::Text(text)) = decode_body(Some("text/plain"), Bytes::from("hi")));
        check!(text == "hi");

        let_assert!(
            Ok(Decoded::Binary(bytes)) =
                decode_body(Some("application/octet-stream"), Bytes::from_static(&[0, 1]))
        );
        check!(bytes == Bytes::from_static(&[0, 1]));
    }

    #[test]
    fn missing_or_unknown_content_types_fail() {
        let_assert!(Err(Error::MissingContentType) = decode_body(None, Bytes::new()));
        let_assert!(
            Err(Error::UnsupportedContentType(ct)) = decode_body(Some("image/png"), Bytes::new())
        );
        check!(ct == "image/png");
    }

    #[test]
    fn invalid_text_is_reported() {
        let_assert!(
            Err(Error::InvalidText(_)) =
                decode_body(Some("text/html"), Bytes::from_static(&[0xff]))
        );
    }

    #[tokio::test]
    async fn step_keeps_status_and_headers() {
        let headers = HashMap::from([("Content-Type".to_string(), "text/csv".to_string())]);
        let raw = Response::new(206, headers, Bytes::from("a,b"));

        let out = decode()
            .erase()
            .run_after(Box::new(raw), crate::StepContext::detached())
            .await
            .expect("decode");
        let_assert!(Ok(response) = out.downcast::<Response<Decoded>>());
        check!(response.status() == 206);
        check!(response.body().as_text() == Some("a,b"));
    }
}
