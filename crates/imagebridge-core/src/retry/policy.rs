use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::PolicyError;

/// Retry-relevant class of a failed attempt, as decided by the policy's classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient failure (timeout, connection reset, 5xx, rate limit). Worth another try.
    Retryable,
    /// Retrying cannot help (bad credentials, malformed request).
    Fatal,
}

/// Decision returned by the retry policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Stop now and surface the error as fatal.
    Fatal,
    /// Out of attempts; surface the last error as exhausted.
    Exhausted,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Pure function from an error value to its retry class.
pub type Classifier<E> = Arc<dyn Fn(&E) -> ErrorClass + Send + Sync>;

/// Exponential backoff policy with a cap, jitter and a caller-supplied classifier.
///
/// Immutable once built; clones share the classifier so one policy can serve
/// many concurrent invocations.
pub struct RetryPolicy<E> {
    /// Maximum number of attempts (including the first). Zero is rejected at invoke time.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for every attempt after that.
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay.
    pub max_delay: Duration,
    /// Jitter ratio in `[0, 1]`; the delay is scaled by a uniform factor in
    /// `[1 - ratio, 1 + ratio]`.
    pub jitter_ratio: f64,
    classifier: Classifier<E>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter_ratio: self.jitter_ratio,
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter_ratio", &self.jitter_ratio)
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E> {
    /// Policy with the default timings (3 attempts, 500ms base, 10s cap, 10% jitter).
    pub fn new<F>(classifier: F) -> Self
    where
        F: Fn(&E) -> ErrorClass + Send + Sync + 'static,
    {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_ratio: 0.1,
            classifier: Arc::new(classifier),
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter ratio. Not clamped: an out-of-range value fails validation.
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    /// Check the policy before any attempt is made.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::NoAttempts);
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(PolicyError::JitterOutOfRange(self.jitter_ratio));
        }
        Ok(())
    }

    pub fn classify(&self, error: &E) -> ErrorClass {
        (self.classifier)(error)
    }

    /// Un-jittered backoff before attempt `attempt + 1`: `base * 2^(attempt-1)`, capped.
    ///
    /// `attempt` is 1-based (1 = the attempt that just failed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// Scale `delay` by a uniform factor in `[1 - jitter, 1 + jitter]`, then cap at `max_delay`.
    pub fn apply_jitter<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        if self.jitter_ratio <= 0.0 || delay.is_zero() {
            return delay.min(self.max_delay);
        }
        let factor = rng.random_range((1.0 - self.jitter_ratio)..=(1.0 + self.jitter_ratio));
        // Scaling a delay near Duration::MAX can leave the representable range.
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Decide what to do after attempt `attempt` failed with an error of class `class`.
    pub fn decide<R: Rng>(&self, attempt: u32, class: ErrorClass, rng: &mut R) -> RetryDecision {
        // A single-attempt policy never distinguishes fatal from retryable.
        if self.max_attempts == 1 {
            return RetryDecision::Exhausted;
        }
        match class {
            ErrorClass::Fatal => RetryDecision::Fatal,
            ErrorClass::Retryable if attempt >= self.max_attempts => RetryDecision::Exhausted,
            ErrorClass::Retryable => {
                RetryDecision::RetryAfter(self.apply_jitter(self.backoff_delay(attempt), rng))
            }
        }
    }
}
