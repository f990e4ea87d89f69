//! TimeSpan-style duration literals (`[-][d.]hh:mm[:ss[.fffffff]]`).
//!
//! Threshold tables, flapping windows and scan frequencies are all written
//! in this notation, e.g. `0:00:30`, `1.02:00:00` or `00:00:01.5`. A bare
//! integer is read as a number of whole days.
//!
//! # Examples
//!
//! ```
//! use chrono::Duration;
//! use delaymon_common::timespan;
//!
//! assert_eq!(timespan::parse("0:01:30").unwrap(), Duration::seconds(90));
//! assert_eq!(timespan::parse("2").unwrap(), Duration::days(2));
//! assert_eq!(timespan::format(Duration::seconds(90)), "00:01:30");
//! ```

use chrono::Duration;

/// Largest day count a TimeSpan literal may carry.
const MAX_DAYS: i64 = 10_675_199;

/// Fractional seconds carry at most 7 digits (100 ns ticks).
const MAX_FRACTION_DIGITS: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeSpanError {
    #[error("empty duration literal")]
    Empty,

    #[error("malformed duration literal '{0}'")]
    Malformed(String),

    #[error("component '{component}' out of range in '{literal}'")]
    OutOfRange {
        component: &'static str,
        literal: String,
    },
}

/// Parses a TimeSpan literal into a [`Duration`].
pub fn parse(literal: &str) -> Result<Duration, TimeSpanError> {
    let trimmed = literal.trim();
    if trimmed.is_empty() {
        return Err(TimeSpanError::Empty);
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    let malformed = || TimeSpanError::Malformed(trimmed.to_string());
    let out_of_range = |component| TimeSpanError::OutOfRange {
        component,
        literal: trimmed.to_string(),
    };

    let (days, hours, minutes, seconds, nanos) = if body.contains(':') {
        let parts: Vec<&str> = body.split(':').collect();
        let (days_hours, minutes, seconds_part) = match parts.as_slice() {
            [dh, m] => (*dh, *m, None),
            [dh, m, s] => (*dh, *m, Some(*s)),
            // d:hh:mm:ss
            [d, h, m, s] => {
                let days = parse_component(d).ok_or_else(malformed)?;
                let hours = parse_component(h).ok_or_else(malformed)?;
                let minutes = parse_component(m).ok_or_else(malformed)?;
                let (seconds, nanos) = parse_seconds(s).ok_or_else(malformed)?;
                return build(negative, days, hours, minutes, seconds, nanos)
                    .map_err(out_of_range);
            }
            _ => return Err(malformed()),
        };

        let (days, hours) = match days_hours.split_once('.') {
            Some((d, h)) => (
                parse_component(d).ok_or_else(malformed)?,
                parse_component(h).ok_or_else(malformed)?,
            ),
            None => (0, parse_component(days_hours).ok_or_else(malformed)?),
        };
        let minutes = parse_component(minutes).ok_or_else(malformed)?;
        let (seconds, nanos) = match seconds_part {
            Some(s) => parse_seconds(s).ok_or_else(malformed)?,
            None => (0, 0),
        };
        (days, hours, minutes, seconds, nanos)
    } else {
        (parse_component(body).ok_or_else(malformed)?, 0, 0, 0, 0)
    };

    build(negative, days, hours, minutes, seconds, nanos).map_err(out_of_range)
}

fn build(
    negative: bool,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: i64,
    nanos: i64,
) -> Result<Duration, &'static str> {
    if days > MAX_DAYS {
        return Err("days");
    }
    if hours > 23 {
        return Err("hours");
    }
    if minutes > 59 {
        return Err("minutes");
    }
    if seconds > 59 {
        return Err("seconds");
    }

    let total_secs = days * 86_400 + hours * 3_600 + minutes * 60 + seconds;
    let magnitude = Duration::try_seconds(total_secs).ok_or("days")? + Duration::nanoseconds(nanos);
    Ok(if negative { -magnitude } else { magnitude })
}

fn parse_component(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `ss` or `ss.fffffff` -> (seconds, nanoseconds)
fn parse_seconds(s: &str) -> Option<(i64, i64)> {
    let Some((whole, fraction)) = s.split_once('.') else {
        return Some((parse_component(s)?, 0));
    };
    let seconds = parse_component(whole)?;
    if fraction.len() > MAX_FRACTION_DIGITS {
        return None;
    }
    let digits = parse_component(fraction)?;
    let scale = 10_i64.pow((9 - fraction.len()) as u32);
    Some((seconds, digits * scale))
}

/// Formats a [`Duration`] as `[-][d.]hh:mm:ss[.fffffff]`.
pub fn format(duration: Duration) -> String {
    let sign = if duration < Duration::zero() { "-" } else { "" };
    let magnitude = duration.abs();
    let total_secs = magnitude.num_seconds();
    let ticks = (magnitude - Duration::seconds(total_secs))
        .num_nanoseconds()
        .unwrap_or(0)
        / 100;

    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::from(sign);
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if ticks > 0 {
        out.push_str(&format!(".{ticks:07}"));
    }
    out
}

/// Serde adapter: `#[serde(with = "delaymon_common::timespan::serde_timespan")]`.
pub mod serde_timespan {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let literal = String::deserialize(deserializer)?;
        super::parse(&literal).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<Duration>`; `None` is written as `null`.
pub mod serde_timespan_opt {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&super::format(*d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|literal| super::parse(&literal).map_err(serde::de::Error::custom))
            .transpose()
    }
}
