//! Decision model: what happens to an invocation after it has run.
//!
//! `RetryDecider` is a pure function of the finished invocation and its
//! result. Acting on the decision (requeue, log, drop) is left to the
//! invocation manager.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::errors::TaskError;
use super::invocation::Invocation;

/// The next action for a finished invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Execution succeeded.
    Done,

    /// Requeue this follow-up attempt ahead of other scheduled work.
    Retry { next: Invocation },

    /// Stop trying.
    Abandon { reason: String },
}

/// Attempt-based retry logic with a fixed retry interval.
#[derive(Debug, Clone)]
pub struct RetryDecider {
    retry_interval: Duration,
}

impl RetryDecider {
    pub fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn decide(
        &self,
        invocation: &Invocation,
        result: &Result<(), TaskError>,
        now: DateTime<Utc>,
    ) -> Decision {
        let err = match result {
            Ok(()) => return Decision::Done,
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Decision::Abandon {
                reason: format!("non-retryable failure: {err}"),
            };
        }
        if !invocation.has_attempts_left() {
            return Decision::Abandon {
                reason: format!(
                    "max attempts reached: {}/{}: {err}",
                    invocation.attempt, invocation.max_attempts
                ),
            };
        }

        // saturate like `Interval::next_after`; a huge interval means "effectively never"
        let run_at = chrono::Duration::from_std(self.retry_interval)
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Decision::Retry {
            next: invocation.retry(run_at),
        }
    }
}
