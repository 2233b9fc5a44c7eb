//! Epoch instant to calendar field values.
//!
//! # Invariants
//! - Values for one instant are mutually consistent: they all come from the
//!   same zoned date-time.
//! - `decompose` output follows ladder order, root excluded.

use crate::model::granularity::Granularity;
use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from time decomposition and time zone parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    /// Epoch milliseconds outside the representable calendar range.
    InvalidInstant(i64),
    /// Time zone name is blank or not a known IANA zone.
    InvalidTimeZone(String),
}

impl Display for TimeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInstant(millis) => {
                write!(f, "epoch millis {millis} is outside the supported calendar range")
            }
            Self::InvalidTimeZone(name) => write!(f, "unknown time zone `{name}`"),
        }
    }
}

impl Error for TimeError {}

/// Parses an IANA time zone name such as `Europe/Prague` or `UTC`.
pub fn parse_time_zone(value: &str) -> Result<Tz, TimeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TimeError::InvalidTimeZone(value.to_string()));
    }
    trimmed
        .parse::<Tz>()
        .map_err(|_| TimeError::InvalidTimeZone(trimmed.to_string()))
}

/// Field value of `epoch_millis` at one granularity in `time_zone`.
///
/// Returns `Ok(None)` for `Granularity::Root`, which has no field.
pub fn field_value(
    epoch_millis: i64,
    time_zone: Tz,
    granularity: Granularity,
) -> Result<Option<i64>, TimeError> {
    let zoned = zoned(epoch_millis, time_zone)?;
    Ok(field_of(&zoned, granularity))
}

/// Field values from `Year` down to `target`, in ladder order.
///
/// Empty for `Granularity::Root`.
pub fn decompose(
    epoch_millis: i64,
    time_zone: Tz,
    target: Granularity,
) -> Result<Vec<(Granularity, i64)>, TimeError> {
    let zoned = zoned(epoch_millis, time_zone)?;
    Ok(target
        .path()
        .iter()
        .filter_map(|granularity| {
            field_of(&zoned, *granularity).map(|value| (*granularity, value))
        })
        .collect())
}

fn zoned(epoch_millis: i64, time_zone: Tz) -> Result<DateTime<Tz>, TimeError> {
    DateTime::from_timestamp_millis(epoch_millis)
        .map(|utc| utc.with_timezone(&time_zone))
        .ok_or(TimeError::InvalidInstant(epoch_millis))
}

fn field_of(zoned: &DateTime<Tz>, granularity: Granularity) -> Option<i64> {
    let value = match granularity {
        Granularity::Root => return None,
        Granularity::Year => i64::from(zoned.year()),
        Granularity::Month => i64::from(zoned.month()),
        Granularity::Day => i64::from(zoned.day()),
        Granularity::Hour => i64::from(zoned.hour()),
        Granularity::Minute => i64::from(zoned.minute()),
        Granularity::Second => i64::from(zoned.second()),
        Granularity::Millisecond => i64::from(zoned.timestamp_subsec_millis()),
    };
    Some(value)
}
