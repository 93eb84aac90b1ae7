//! Retry step.
//!
//! Re-issues a call whose response is not a success, through the refetch
//! capability of the [`StepContext`](crate::StepContext). Register it before
//! any parsing step: it works on the raw `Response<Bytes>`.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{Refetch, Response, Result, Step};

/// Re-issues a failed call through [`Refetch`] a bounded number of times.
///
/// A non-2xx status is data, not an error: when every attempt fails the last
/// response is returned as-is. Transport errors raised by a refetch do
/// propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCoordinator {
    max_attempts: u32,
}

enum State {
    Evaluating(Response<Bytes>),
    Retrying {
        remaining: u32,
        last: Response<Bytes>,
    },
    Done(Response<Bytes>),
}

impl RetryCoordinator {
    /// Allow up to `max_attempts` refetches after the initial failure.
    #[must_use]
    pub const fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Maximum number of refetches.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drive `response` to a final result.
    ///
    /// Without a refetch capability a failure is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns the error of a refetch that could not be carried out.
    pub async fn run(
        &self,
        response: Response<Bytes>,
        refetch: Option<&Refetch>,
    ) -> Result<Response<Bytes>> {
        let mut state = State::Evaluating(response);

        loop {
            state = match state {
                State::Evaluating(response) if response.is_success() => State::Done(response),
                State::Evaluating(response) => State::Retrying {
                    remaining: self.max_attempts,
                    last: response,
                },
                State::Retrying { remaining, last } => {
                    self.attempt(remaining, last, refetch).await?
                }
                State::Done(response) => return Ok(response),
            };
        }
    }

    async fn attempt(
        &self,
        remaining: u32,
        last: Response<Bytes>,
        refetch: Option<&Refetch>,
    ) -> Result<State> {
        let Some(refetch) = refetch else {
            debug!(status = last.status(), "no refetch available, keeping response");
            return Ok(State::Done(last));
        };
        if remaining == 0 {
            warn!(
                attempts = self.max_attempts,
                status = last.status(),
                "retries exhausted"
            );
            return Ok(State::Done(last));
        }

        let attempt = self.max_attempts - remaining + 1;
        debug!(attempt, previous_status = last.status(), "refetching");
        let response = refetch.call().await?;

        Ok(if response.is_success() {
            State::Done(response)
        } else {
            State::Retrying {
                remaining: remaining - 1,
                last: response,
            }
        })
    }
}

/// `retry`: refetch up to `max_attempts` times while the response is not 2xx.
///
/// Works on the raw response, so register it before any parsing step.
#[must_use]
pub fn retry(max_attempts: u32) -> Step<Response<Bytes>> {
    let coordinator = RetryCoordinator::new(max_attempts);
    Step::new("retry").after_with_context(move |response: Response<Bytes>, cx| async move {
        coordinator.run(response, cx.refetch()).await
    })
}
