//! Attempt sinks: where the core reports each attempt.
//!
//! Sinks are shared across concurrent invocations, so they take `&self` and
//! must be `Send + Sync`. A sink error is logged by the caller and dropped.

use anyhow::Result;
use std::sync::Mutex;

use super::attempt::{AttemptEvent, AttemptOutcome};

pub trait AttemptSink: Send + Sync {
    fn record(&self, event: &AttemptEvent) -> Result<()>;
}

/// Emits each attempt as a `tracing` event.
#[derive(Debug, Default, Clone)]
pub struct TracingSink {
    /// Label for the wrapped operation (e.g. "generate", "download").
    pub operation: &'static str,
}

impl TracingSink {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

impl AttemptSink for TracingSink {
    fn record(&self, event: &AttemptEvent) -> Result<()> {
        let op = self.operation;
        let (attempt, delay_ms, outcome) = (event.attempt, event.delay_ms, event.outcome.as_str());
        match event.outcome {
            AttemptOutcome::Success => {
                tracing::info!(op, attempt, delay_ms, outcome, "attempt finished")
            }
            AttemptOutcome::RetryableFailure => {
                tracing::warn!(op, attempt, delay_ms, outcome, "attempt finished")
            }
            AttemptOutcome::FatalFailure => {
                tracing::error!(op, attempt, delay_ms, outcome, "attempt finished")
            }
            AttemptOutcome::Pending => {
                tracing::debug!(op, attempt, delay_ms, outcome, "attempt pending")
            }
        }
        Ok(())
    }
}

/// Collects events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AttemptEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AttemptEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AttemptSink for MemorySink {
    fn record(&self, event: &AttemptEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("memory sink poisoned"))?
            .push(*event);
        Ok(())
    }
}

/// Fans one event out to several sinks; the first error wins but every sink is called.
pub struct FanoutSink<'a> {
    sinks: Vec<&'a dyn AttemptSink>,
}

impl<'a> FanoutSink<'a> {
    pub fn new(sinks: Vec<&'a dyn AttemptSink>) -> Self {
        Self { sinks }
    }
}

impl AttemptSink for FanoutSink<'_> {
    fn record(&self, event: &AttemptEvent) -> Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.record(event) {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
