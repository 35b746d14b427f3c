//! Bounded fixed-delay retry for fallible UI operations.
//!
//! The wrapped operations are idempotent or cheaply re-entrant (re-opening a
//! menu, re-locating a control), so a fixed backoff recovers faster than an
//! exponential one would and is the deliberate choice here.

use std::time::Duration;

use tracing::warn;

use crate::errors::BotError;

#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

impl Retry {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Run `op` up to `max_attempts` times with a fixed delay between
    /// attempts. Exhaustion is reported as [`BotError::RetryExhausted`]
    /// carrying the last underlying failure; this never panics and callers
    /// must branch on the result before proceeding.
    pub fn run<T>(
        &self,
        label: &str,
        mut op: impl FnMut() -> Result<T, BotError>,
    ) -> Result<T, BotError> {
        let attempts = self.max_attempts.max(1);
        let mut last = None;
        for attempt in 1..=attempts {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(label, attempt, max = attempts, error = %e, "attempt failed");
                    last = Some(e);
                }
            }
            if attempt < attempts {
                std::thread::sleep(self.backoff);
            }
        }
        Err(BotError::RetryExhausted {
            label: label.to_string(),
            attempts,
            source: Box::new(last.unwrap_or_else(|| BotError::Input("no attempt ran".into()))),
        })
    }
}
