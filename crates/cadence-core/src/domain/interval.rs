//! Interval - 繰り返し式のパース結果
//!
//! `recurrence::parse_interval` が生成する不変の値です。

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit word accepted after the count in a recurrence expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    /// Resolve an upper-cased unit word (singular or plural).
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "SECOND" | "SECONDS" => Some(TimeUnit::Second),
            "MINUTE" | "MINUTES" => Some(TimeUnit::Minute),
            "HOUR" | "HOURS" => Some(TimeUnit::Hour),
            "DAY" | "DAYS" => Some(TimeUnit::Day),
            _ => None,
        }
    }

    pub fn as_duration(self) -> Duration {
        match self {
            TimeUnit::Second => Duration::from_secs(1),
            TimeUnit::Minute => Duration::from_secs(60),
            TimeUnit::Hour => Duration::from_secs(60 * 60),
            TimeUnit::Day => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// How the first run of an interval is anchored.
///
/// - `OffsetFromStart`: first run is "now + frequency"
/// - `ActualStartTime`: first run is a concrete wall-clock instant, then every frequency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IntervalMode {
    OffsetFromStart,
    ActualStartTime { start: DateTime<Utc> },
}

/// Parsed recurrence descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub mode: IntervalMode,
    pub frequency: Duration,
    /// When the expression was evaluated. Kept so first-run maths is reproducible.
    pub calculated_at: DateTime<Utc>,
}

impl Interval {
    pub fn offset_from_start(frequency: Duration, calculated_at: DateTime<Utc>) -> Self {
        Self {
            mode: IntervalMode::OffsetFromStart,
            frequency,
            calculated_at,
        }
    }

    pub fn actual_start_time(
        frequency: Duration,
        start: DateTime<Utc>,
        calculated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            mode: IntervalMode::ActualStartTime { start },
            frequency,
            calculated_at,
        }
    }

    /// The anchor instant, only present for `ActualStartTime`.
    pub fn actual_start(&self) -> Option<DateTime<Utc>> {
        match self.mode {
            IntervalMode::OffsetFromStart => None,
            IntervalMode::ActualStartTime { start } => Some(start),
        }
    }

    pub fn frequency_delta(&self) -> chrono::Duration {
        // Parser already bounds frequencies, so this only saturates on absurd values.
        chrono::Duration::from_std(self.frequency).unwrap_or(chrono::Duration::MAX)
    }

    /// First due instant when a manager starts at `now`.
    ///
    /// An `ActualStartTime` anchor that has gone stale between parsing and
    /// starting is rolled forward by whole frequencies.
    pub fn first_run(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.mode {
            IntervalMode::OffsetFromStart => now
                .checked_add_signed(self.frequency_delta())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            IntervalMode::ActualStartTime { start } => {
                roll_forward(start, self.frequency_delta(), now).unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
        }
    }

    /// Next scheduled instant after `previous`, skipping any slots already missed at `now`.
    pub fn next_after(&self, previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        previous
            .checked_add_signed(self.frequency_delta())
            .and_then(|candidate| roll_forward(candidate, self.frequency_delta(), now))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Advance `candidate` by whole `step`s until it is not before `now`.
///
/// `None` on overflow or a non-positive step.
pub(crate) fn roll_forward(
    candidate: DateTime<Utc>,
    step: chrono::Duration,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if candidate >= now {
        return Some(candidate);
    }
    let step_ms = step.num_milliseconds();
    if step_ms <= 0 {
        return None;
    }
    let behind_ms = (now - candidate).num_milliseconds();
    let skips = behind_ms / step_ms + 1;
    candidate.checked_add_signed(chrono::Duration::milliseconds(step_ms.checked_mul(skips)?))
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            IntervalMode::OffsetFromStart => write!(f, "every {:?}", self.frequency),
            IntervalMode::ActualStartTime { start } => {
                write!(f, "every {:?} from {}", self.frequency, start.to_rfc3339())
            }
        }
    }
}
