//! `snake_case` to `camelCase` key rewriting over JSON values.

use serde_json::{Map, Value};

use crate::Step;

/// Rewrites `snake_case` to `camelCase`: `_x` becomes `X` for any lowercase `x`.
///
/// ```
/// use ferrule::steps::snake_to_camel;
///
/// assert_eq!(snake_to_camel("zip_code"), "zipCode");
/// assert_eq!(snake_to_camel("_private"), "Private");
/// assert_eq!(snake_to_camel("trailing_"), "trailing_");
/// ```
#[must_use]
pub fn snake_to_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();

    while let Some(c) = chars.next() {
        match chars.peek().copied() {
            Some(next) if c == '_' && next.is_ascii_lowercase() => {
                out.push(next.to_ascii_uppercase());
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

/// Rewrites every object key, at any depth, with [`snake_to_camel`].
#[must_use]
pub fn keys_to_camel_case(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (snake_to_camel(&key), keys_to_camel_case(value)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(keys_to_camel_case).collect()),
        other => other,
    }
}

/// `camel-case`: apply [`keys_to_camel_case`] to a parsed JSON value.
#[must_use]
pub fn camel_case() -> Step<Value> {
    Step::new("camel-case").after(|value: Value| async move { Ok(keys_to_camel_case(value)) })
}
