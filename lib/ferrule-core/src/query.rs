//! Query string encoding.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left alone in query keys and values.
///
/// Matches the unreserved set of `encodeURIComponent`: alphanumerics and
/// `- _ . ! ~ * ' ( )`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode one query key or value.
#[must_use]
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Build a query suffix (`?a=1&b=2`) from name/value pairs.
///
/// Returns an empty string when there are no pairs.
///
/// # Example
///
/// ```
/// use ferrule_core::to_query_suffix;
///
/// let pairs = [("q", "rust lang"), ("page", "2")];
/// assert_eq!(to_query_suffix(pairs), "?q=rust%20lang&page=2");
/// assert_eq!(to_query_suffix(Vec::<(String, String)>::new()), "");
/// ```
pub fn to_query_suffix<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let query = pairs
        .into_iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                encode_component(key.as_ref()),
                encode_component(value.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        query
    } else {
        format!("?{query}")
    }
}
