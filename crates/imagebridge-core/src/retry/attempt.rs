//! Per-attempt records and the event handed to the attempt sink.

use std::fmt;
use std::time::{Duration, Instant};

/// Outcome tag of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Success,
    RetryableFailure,
    FatalFailure,
}

impl AttemptOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptOutcome::Pending => "pending",
            AttemptOutcome::Success => "success",
            AttemptOutcome::RetryableFailure => "retryable_failure",
            AttemptOutcome::FatalFailure => "fatal_failure",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of the wrapped operation.
///
/// Starts `Pending`; [`CallAttempt::complete`] consumes it, so a finished
/// attempt can't be completed twice.
#[derive(Debug, Clone)]
pub struct CallAttempt {
    number: u32,
    started_at: Instant,
    delay_before: Duration,
    outcome: AttemptOutcome,
}

impl CallAttempt {
    /// Start attempt `number` (1-based), after having waited `delay_before`.
    pub fn start(number: u32, delay_before: Duration) -> Self {
        Self {
            number,
            started_at: Instant::now(),
            delay_before,
            outcome: AttemptOutcome::Pending,
        }
    }

    pub fn complete(self, outcome: AttemptOutcome) -> Self {
        debug_assert_eq!(self.outcome, AttemptOutcome::Pending);
        Self { outcome, ..self }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn outcome(&self) -> AttemptOutcome {
        self.outcome
    }

    pub fn event(&self) -> AttemptEvent {
        AttemptEvent {
            attempt: self.number,
            delay_ms: self.delay_before.as_millis() as u64,
            outcome: self.outcome,
        }
    }
}

/// Observability record emitted once per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptEvent {
    pub attempt: u32,
    /// Backoff waited before this attempt (0 for the first).
    pub delay_ms: u64,
    pub outcome: AttemptOutcome,
}
