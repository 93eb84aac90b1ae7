//! URL resolution against a base endpoint.

use url::Url;

use crate::Result;

/// Returns `true` if `path` already starts with a URL scheme (`https://...`).
#[must_use]
pub fn has_scheme(path: &str) -> bool {
    let Some((scheme, _)) = path.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolve the final request URL.
///
/// Absolute paths bypass the base endpoint. Otherwise exactly one `/` joins
/// the base and the path, and `query` (already encoded, with its leading `?`)
/// is appended, merging with any query the path carries.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`](crate::Error::InvalidUrl) if the result
/// does not parse, e.g. a relative path with no base endpoint.
///
/// # Example
///
/// ```
/// use ferrule_core::resolve_url;
///
/// let url = resolve_url(Some("https://api.example.com/v1/"), "/todos/1", "").expect("url");
/// assert_eq!(url.as_str(), "https://api.example.com/v1/todos/1");
///
/// let url = resolve_url(Some("https://api.example.com"), "https://other.dev/x", "?a=1")
///     .expect("url");
/// assert_eq!(url.as_str(), "https://other.dev/x?a=1");
/// ```
pub fn resolve_url(base: Option<&str>, path: &str, query: &str) -> Result<Url> {
    let mut joined = match base {
        Some(base) if !base.is_empty() && !has_scheme(path) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
        _ => path.to_string(),
    };

    if let Some(pairs) = query.strip_prefix('?') {
        joined.push(if joined.contains('?') { '&' } else { '?' });
        joined.push_str(pairs);
    }

    Ok(Url::parse(&joined)?)
}
