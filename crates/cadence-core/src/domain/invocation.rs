//! Invocation - タスクの 1 回分の実行
//!
//! scheduled キューに積まれ、期限が来たら running キューに移り、
//! 完了（成功 / リトライ再投入 / 断念）で running から外れます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why an invocation exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationReason {
    Scheduled,
    Retry,
    Manual,
}

/// One concrete scheduled or in-flight execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Unique within its manager; the queue removal key.
    pub counter: u64,
    pub run_at: DateTime<Utc>,
    /// `None` until execution begins.
    pub started_at: Option<DateTime<Utc>>,
    /// 1-indexed.
    pub attempt: u32,
    pub max_attempts: u32,
    pub reason: InvocationReason,
}

impl Invocation {
    pub fn new(
        counter: u64,
        run_at: DateTime<Utc>,
        max_attempts: u32,
        reason: InvocationReason,
    ) -> Self {
        Self {
            counter,
            run_at,
            started_at: None,
            attempt: 1,
            max_attempts,
            reason,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.run_at <= now
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    /// The follow-up attempt, due at `run_at`. Keeps the counter.
    pub fn retry(&self, run_at: DateTime<Utc>) -> Self {
        Self {
            counter: self.counter,
            run_at,
            started_at: None,
            attempt: self.attempt + 1,
            max_attempts: self.max_attempts,
            reason: InvocationReason::Retry,
        }
    }
}
