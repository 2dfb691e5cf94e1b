//! Recurrence parser: natural-language interval expressions.
//!
//! # 受け付ける形
//! - `"<n> <unit>"` → `OffsetFromStart`（例: `"10 seconds"`）
//! - `"<n> <unit> AT HH[:]MM[[:]SS]"` → `ActualStartTime`（例: `"1 day at 14:30:00"`）
//! - 先頭が単位だけなら `1` を補う（`"day"` ≡ `"1 day"`）
//!
//! unit は `SECOND(S) | MINUTE(S) | HOUR(S) | DAY(S)`、大文字小文字は問いません。
//! 時刻はすべて UTC で解釈します。

mod normalize;
mod time_of_day;

use std::time::Duration;

use chrono::{DateTime, TimeZone, Timelike, Utc};

use crate::domain::interval::roll_forward;
use crate::domain::{Interval, TimeUnit};
use normalize::tokenize;
use time_of_day::TimeOfDay;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MINUTE: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid recurrence expression '{0}'")]
    InvalidExpression(String),

    #[error("invalid time of day in '{expression}': {reason}")]
    InvalidTimeOfDay { expression: String, reason: String },
}

/// Parse `expression` relative to the current time.
pub fn parse_interval(expression: &str) -> Result<Interval, ParseError> {
    parse_interval_at(expression, Utc::now())
}

/// Parse `expression` as if it were evaluated at `now`.
pub fn parse_interval_at(expression: &str, now: DateTime<Utc>) -> Result<Interval, ParseError> {
    let tokens = tokenize(expression);
    let invalid = || ParseError::InvalidExpression(expression.to_string());

    match tokens.as_slice() {
        [count, unit] => {
            let frequency = frequency(count, unit).ok_or_else(invalid)?;
            Ok(Interval::offset_from_start(frequency, now))
        }
        [count, unit, at, time] if at == "AT" => {
            let frequency = frequency(count, unit).ok_or_else(invalid)?;
            let start = first_occurrence(expression, frequency, time, now)?;
            Ok(Interval::actual_start_time(frequency, start, now))
        }
        _ => Err(invalid()),
    }
}

/// Parse a bare `"<n> <unit>"` duration such as a retry interval. No `AT` clause.
pub fn parse_duration(expression: &str) -> Result<Duration, ParseError> {
    match tokenize(expression).as_slice() {
        [count, unit] => frequency(count, unit),
        _ => None,
    }
    .ok_or_else(|| ParseError::InvalidExpression(expression.to_string()))
}

/// `count × unit`, or `None` if the count is not a positive integer or the unit is unknown.
fn frequency(count: &str, unit: &str) -> Option<Duration> {
    let count: u32 = count.parse().ok().filter(|n| *n >= 1)?;
    let unit = TimeUnit::from_word(unit)?;
    unit.as_duration().checked_mul(count)
}

/// Today's occurrence of `time`, pushed on by whole frequencies if it has already passed.
///
/// Components finer than the frequency's granularity are kept, coarser ones
/// are taken from `now`: the hour is ignored below one day, the minute below
/// one hour. A one-minute frequency needs explicit seconds.
fn first_occurrence(
    expression: &str,
    frequency: Duration,
    time: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ParseError> {
    let bad_time = |reason: String| ParseError::InvalidTimeOfDay {
        expression: expression.to_string(),
        reason,
    };

    let parsed = TimeOfDay::parse(time).map_err(bad_time)?;

    let hour = if frequency < DAY { now.hour() } else { parsed.hour };
    let minute = if frequency < HOUR {
        now.minute()
    } else {
        parsed.minute
    };
    let second = match parsed.second {
        Some(s) => s,
        None if frequency == MINUTE => {
            return Err(bad_time(
                "seconds are required for a one minute frequency".to_string(),
            ));
        }
        None => 0,
    };

    let candidate = now
        .date_naive()
        .and_hms_opt(hour, minute, second)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| bad_time(format!("{hour:02}:{minute:02}:{second:02} is not a valid time")))?;

    chrono::Duration::from_std(frequency)
        .ok()
        .and_then(|step| roll_forward(candidate, step, now))
        .ok_or_else(|| ParseError::InvalidExpression(expression.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IntervalMode;
    use rstest::rstest;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[rstest]
    #[case("10 seconds", 10)]
    #[case("1 second", 1)]
    #[case("5 MINUTES", 300)]
    #[case("1 minute", 60)]
    #[case("2 hours", 7200)]
    #[case("3 Days", 259_200)]
    #[case("day", 86_400)]
    #[case("Hour", 3600)]
    fn two_token_expressions_offset_from_start(#[case] expr: &str, #[case] secs: u64) {
        let now = at(9, 0, 0);
        let interval = parse_interval_at(expr, now).unwrap();
        assert_eq!(interval.mode, IntervalMode::OffsetFromStart);
        assert_eq!(interval.frequency, Duration::from_secs(secs));
        assert_eq!(interval.calculated_at, now);
    }

    #[test]
    fn bare_unit_is_same_as_count_of_one() {
        let now = at(9, 0, 0);
        assert_eq!(
            parse_interval_at("DAY", now).unwrap(),
            parse_interval_at("1 day", now).unwrap()
        );
    }

    #[test]
    fn daily_time_later_today_is_kept() {
        let interval = parse_interval_at("1 day at 14:30:00", at(9, 0, 0)).unwrap();
        assert_eq!(interval.actual_start(), Some(at(14, 30, 0)));
        assert_eq!(interval.frequency, DAY);
    }

    #[test]
    fn daily_time_already_past_rolls_to_tomorrow() {
        let interval = parse_interval_at("1 day at 14:30", at(15, 0, 0)).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 3, 11, 14, 30, 0).unwrap();
        assert_eq!(interval.actual_start(), Some(expected));
    }

    #[test]
    fn hour_is_ignored_below_one_day() {
        // 2 時間ごと: 時は now の時、分秒だけ使う
        let interval = parse_interval_at("2 hours at 03:45:10", at(9, 20, 0)).unwrap();
        assert_eq!(interval.actual_start(), Some(at(9, 45, 10)));

        let rolled = parse_interval_at("2 hours at 03:15:00", at(9, 20, 0)).unwrap();
        assert_eq!(rolled.actual_start(), Some(at(11, 15, 0)));
    }

    #[test]
    fn minute_is_ignored_below_one_hour() {
        let interval = parse_interval_at("5 minutes at 00:00:30", at(9, 20, 10)).unwrap();
        assert_eq!(interval.actual_start(), Some(at(9, 20, 30)));

        let rolled = parse_interval_at("5 minutes at 00:00:05", at(9, 20, 10)).unwrap();
        assert_eq!(rolled.actual_start(), Some(at(9, 25, 5)));
    }

    #[test]
    fn one_minute_frequency_requires_seconds() {
        let err = parse_interval_at("1 minute at 12:00", at(9, 0, 0)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimeOfDay { .. }));

        let ok = parse_interval_at("minute at 00:00:15", at(9, 0, 20)).unwrap();
        assert_eq!(ok.actual_start(), Some(at(9, 1, 15)));
    }

    #[rstest]
    #[case("1 day at 14:30:00")]
    #[case("2 hours at 00:00:00")]
    #[case("1 minute at 00:00:00")]
    #[case("10 seconds at 00:00:00")]
    #[case("7 days at 23:59:59")]
    fn actual_start_is_never_in_the_past(#[case] expr: &str) {
        for now in [at(0, 0, 0), at(12, 34, 56), at(23, 59, 59)] {
            let interval = parse_interval_at(expr, now).unwrap();
            let start = interval.actual_start().unwrap();
            assert!(start >= now, "{expr} at {now}: {start}");
        }
    }

    #[rstest]
    #[case("")]
    #[case("often")]
    #[case("0 seconds")]
    #[case("ten seconds")]
    #[case("10 fortnights")]
    #[case("10")]
    #[case("10 seconds from now")]
    #[case("1 day on 12:00")]
    #[case("1 day at")]
    #[case("99999999999 days")]
    fn invalid_expressions_are_rejected(#[case] expr: &str) {
        assert_eq!(
            parse_interval_at(expr, at(9, 0, 0)),
            Err(ParseError::InvalidExpression(expr.to_string()))
        );
    }

    #[rstest]
    #[case("1 day at 25:00:00")]
    #[case("1 day at 12:61")]
    #[case("1 day at noon")]
    #[case("1 hour at 1:5")]
    fn malformed_time_is_rejected(#[case] expr: &str) {
        let err = parse_interval_at(expr, at(9, 0, 0)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidTimeOfDay { .. }), "{err}");
    }

    #[test]
    fn parse_duration_accepts_value_unit_only() {
        assert_eq!(parse_duration("1 second"), Ok(Duration::from_secs(1)));
        assert_eq!(parse_duration("30 Minutes"), Ok(Duration::from_secs(1800)));
        assert_eq!(parse_duration("hour"), Ok(HOUR));
        assert!(parse_duration("1 day at 12:00:00").is_err());
        assert!(parse_duration("soon").is_err());
    }
}
