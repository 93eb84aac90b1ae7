//! Before- and after-chain execution.
//!
//! Both chains walk the same step list in registration order and run one
//! step at a time. The first failing transform aborts the chain and its error
//! is returned as-is.

use std::collections::HashSet;

use tracing::debug;

use crate::{AnyStep, Payload, RequestConfig, Result, StepContext};

/// Run every before-transform over `config`.
///
/// With no config nothing runs and `None` is returned: the caller asked for no
/// request shaping. Otherwise each step not named in the config's exclusion
/// set receives the previous step's output.
///
/// The caller owns `config`; pass a clone to keep an untouched original.
pub async fn run_before(
    steps: &[AnyStep],
    config: Option<RequestConfig>,
) -> Result<Option<RequestConfig>> {
    let Some(mut config) = config else {
        return Ok(None);
    };
    let exclude = config.exclude.clone();

    for step in steps {
        if exclude.contains(step.name()) {
            debug!(step = step.name(), "skipping excluded before-transform");
            continue;
        }
        if step.has_before() {
            debug!(step = step.name(), "running before-transform");
            config = step.run_before(config).await?;
        }
    }

    Ok(Some(config))
}

/// Fold the transport result through every after-transform.
///
/// Each step sees only the previous step's output, so a parsing step must be
/// registered before a step that expects parsed data.
pub async fn run_after(
    steps: &[AnyStep],
    raw: Payload,
    exclude: &HashSet<String>,
    cx: &StepContext,
) -> Result<Payload> {
    let mut value = raw;

    for step in steps {
        if exclude.contains(step.name()) {
            debug!(step = step.name(), "skipping excluded after-transform");
            continue;
        }
        if step.has_after() {
            debug!(step = step.name(), "running after-transform");
            value = step.run_after(value, cx.clone()).await?;
        }
    }

    Ok(value)
}
