//! Retry loop: run an async operation until success, a fatal error, exhaustion or cancellation.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::attempt::{AttemptOutcome, CallAttempt};
use super::error::{Completed, InvocationError, InvocationResult};
use super::policy::{ErrorClass, RetryDecision, RetryPolicy};
use super::sink::{AttemptSink, TracingSink};

/// Runs `operation` under `policy`, reporting every attempt to `sink`.
///
/// The backoff wait races `cancel`; a cancellation observed there (or before
/// an attempt starts) ends the loop with `Cancelled` and no further attempt.
/// An attempt already in flight is not interrupted.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    sink: &dyn AttemptSink,
    cancel: &CancellationToken,
    mut operation: F,
) -> InvocationResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    policy.validate()?;

    let mut attempt = 1u32;
    let mut delay_before = Duration::ZERO;
    let mut last_error: Option<E> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(InvocationError::Cancelled {
                attempts: attempt - 1,
                last_error,
            });
        }

        let started = CallAttempt::start(attempt, delay_before);
        let error = match operation().await {
            Ok(value) => {
                emit(sink, &started.complete(AttemptOutcome::Success));
                return Ok(Completed {
                    value,
                    attempts: attempt,
                });
            }
            Err(e) => e,
        };

        let class = policy.classify(&error);
        let outcome = match class {
            ErrorClass::Retryable => AttemptOutcome::RetryableFailure,
            ErrorClass::Fatal => AttemptOutcome::FatalFailure,
        };
        emit(sink, &started.complete(outcome));

        let decision = policy.decide(attempt, class, &mut rand::rng());
        let delay = match decision {
            RetryDecision::Fatal => {
                return Err(InvocationError::Fatal {
                    error,
                    attempts: attempt,
                })
            }
            RetryDecision::Exhausted => {
                return Err(InvocationError::Exhausted {
                    error,
                    attempts: attempt,
                })
            }
            RetryDecision::RetryAfter(d) => d,
        };

        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off");
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(attempt, "cancelled during backoff");
                return Err(InvocationError::Cancelled {
                    attempts: attempt,
                    last_error: Some(error),
                });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        last_error = Some(error);
        delay_before = delay;
        attempt += 1;
    }
}

/// [`run_with_retry`] with a tracing sink and no cancellation.
pub async fn invoke<T, E, F, Fut>(policy: &RetryPolicy<E>, operation: F) -> InvocationResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let sink = TracingSink::new("invoke");
    run_with_retry(policy, &sink, &CancellationToken::new(), operation).await
}

fn emit(sink: &dyn AttemptSink, attempt: &CallAttempt) {
    tracing::trace!(
        attempt = attempt.number(),
        elapsed_ms = attempt.started_at().elapsed().as_millis() as u64,
        outcome = %attempt.outcome(),
        "attempt completed"
    );
    if let Err(e) = sink.record(&attempt.event()) {
        tracing::warn!(attempt = attempt.number(), "attempt sink failed: {:#}", e);
    }
}
