//! Relative review dates ("3 weeks ago") to absolute timestamps.
//!
//! The conversion is deliberately coarse: a year is 365 days, a month 30 days,
//! and "moments" is a single second. The same table must be used everywhere a
//! stored `timestamp` is compared, so do not refine it locally.

use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("empty relative date")]
    Empty,
    #[error("unrecognized unit in relative date {0:?}")]
    UnrecognizedUnit(String),
    #[error("invalid magnitude in relative date {0:?}")]
    InvalidMagnitude(String),
    #[error("relative date {0:?} is out of range")]
    OutOfRange(String),
}

/// Seconds per unit, and whether the unit is the plural form.
fn unit_seconds(unit: &str) -> Option<(u64, bool)> {
    Some(match unit {
        "year" => (YEAR, false),
        "years" => (YEAR, true),
        "month" => (MONTH, false),
        "months" => (MONTH, true),
        "week" => (WEEK, false),
        "weeks" => (WEEK, true),
        "day" => (DAY, false),
        "days" => (DAY, true),
        "hour" => (HOUR, false),
        "hours" => (HOUR, true),
        "minute" => (MINUTE, false),
        "minutes" => (MINUTE, true),
        _ => return None,
    })
}

/// Parses `text` into the elapsed [`Duration`] it denotes.
pub fn parse_relative(text: &str) -> Result<Duration, DateError> {
    let mut tokens = text.split_whitespace().collect::<Vec<_>>();
    if tokens.last().is_some_and(|t| t.eq_ignore_ascii_case("ago")) {
        tokens.pop();
    }

    match *tokens.as_slice() {
        [] => Err(DateError::Empty),
        ["moments"] => Ok(Duration::from_secs(1)),
        [magnitude, unit] => {
            let unit = unit.to_ascii_lowercase();
            if unit == "moments" {
                return Ok(Duration::from_secs(1));
            }
            let Some((secs, plural)) = unit_seconds(&unit) else {
                return Err(DateError::UnrecognizedUnit(text.to_owned()));
            };
            let n = if plural {
                magnitude
                    .parse::<u64>()
                    .map_err(|_| DateError::InvalidMagnitude(text.to_owned()))?
            } else {
                1
            };
            n.checked_mul(secs)
                .map(Duration::from_secs)
                .ok_or_else(|| DateError::InvalidMagnitude(text.to_owned()))
        }
        _ => Err(DateError::UnrecognizedUnit(text.to_owned())),
    }
}

/// Resolves `text` against `now`. Results before 1970 are rejected.
pub fn resolve(text: &str, now: SystemTime) -> Result<SystemTime, DateError> {
    let elapsed = parse_relative(text)?;
    let resolved = now
        .checked_sub(elapsed)
        .filter(|t| t.duration_since(UNIX_EPOCH).is_ok())
        .ok_or_else(|| DateError::OutOfRange(text.to_owned()))?;
    tracing::debug!(target: "date", "{text:?} -> {elapsed:?} before {now:?}");
    Ok(resolved)
}
