//! Retry and backoff core.
//!
//! Wraps an idempotent async operation with bounded retry, exponential backoff
//! with jitter, a caller-supplied retryable/fatal classifier and cancellation
//! during backoff. Every outcome is a value: [`Completed`] or one of the four
//! [`InvocationError`] kinds. Each attempt is reported to an [`AttemptSink`].

mod attempt;
mod error;
mod policy;
mod run;
mod sink;

pub use attempt::{AttemptEvent, AttemptOutcome, CallAttempt};
pub use error::{Completed, FailureKind, InvocationError, InvocationResult, PolicyError};
pub use policy::{Classifier, ErrorClass, RetryDecision, RetryPolicy};
pub use run::{invoke, run_with_retry};
pub use sink::{AttemptSink, FanoutSink, MemorySink, TracingSink};
