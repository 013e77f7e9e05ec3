//! Terminal outcomes of one retried invocation.

/// Retry policy rejected before any attempt was made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    NoAttempts,
    #[error("jitter ratio {0} is outside [0, 1]")]
    JitterOutOfRange(f64),
}

/// Successful invocation: the value plus the 1-based attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T> {
    pub value: T,
    pub attempts: u32,
}

/// Failure taxonomy of the retrying core. Always returned, never panicked.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError<E> {
    /// Invalid policy; the operation was never invoked.
    #[error("invalid retry policy: {0}")]
    Configuration(#[from] PolicyError),
    /// Classifier marked the error non-retryable.
    #[error("request rejected on attempt {attempts}: {error}")]
    Fatal { error: E, attempts: u32 },
    /// Ran out of attempts; `error` is the last one seen.
    #[error("gave up after {attempts} attempt(s): {error}")]
    Exhausted { error: E, attempts: u32 },
    /// Caller cancelled while waiting (or before the next attempt started).
    #[error("cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32, last_error: Option<E> },
}

/// Tag for [`InvocationError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    Fatal,
    Exhausted,
    Cancelled,
}

impl<E> InvocationError<E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            InvocationError::Configuration(_) => FailureKind::Configuration,
            InvocationError::Fatal { .. } => FailureKind::Fatal,
            InvocationError::Exhausted { .. } => FailureKind::Exhausted,
            InvocationError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    /// Attempts actually made before this outcome (0 for `Configuration`).
    pub fn attempts(&self) -> u32 {
        match self {
            InvocationError::Configuration(_) => 0,
            InvocationError::Fatal { attempts, .. }
            | InvocationError::Exhausted { attempts, .. }
            | InvocationError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The last underlying error, if any attempt failed.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            InvocationError::Configuration(_) => None,
            InvocationError::Fatal { error, .. } | InvocationError::Exhausted { error, .. } => {
                Some(error)
            }
            InvocationError::Cancelled { last_error, .. } => last_error.as_ref(),
        }
    }
}

/// The only value a caller of the core observes.
pub type InvocationResult<T, E> = Result<Completed<T>, InvocationError<E>>;
