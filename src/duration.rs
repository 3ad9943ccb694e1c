//! ISO-8601 durations coming from the graph time picker.

use chrono::{DateTime, Months, TimeDelta, Utc};
use tracing::warn;

/// Used whenever the requested duration cannot be parsed.
pub const FALLBACK_DURATION: &str = "PT12H";

/// Unix seconds of `now - duration`.
///
/// Years and months are subtracted on the calendar. An invalid or
/// out-of-range duration is logged and replaced by [`FALLBACK_DURATION`].
pub fn parse_from(now: DateTime<Utc>, duration: &str) -> i64 {
    match subtract(now, duration) {
        Ok(from) => from.timestamp(),
        Err(e) => {
            warn!(duration, error = %e, "failed to parse duration, using {}", FALLBACK_DURATION);
            TimeDelta::try_hours(12)
                .and_then(|twelve_hours| now.checked_sub_signed(twelve_hours))
                .unwrap_or(now)
                .timestamp()
        }
    }
}

fn subtract(now: DateTime<Utc>, duration: &str) -> Result<DateTime<Utc>, String> {
    let parsed = iso8601::duration(duration)?;
    let out_of_range = || format!("duration '{}' is out of range", duration);

    match parsed {
        iso8601::Duration::Weeks(weeks) => TimeDelta::try_weeks(i64::from(weeks))
            .and_then(|delta| now.checked_sub_signed(delta))
            .ok_or_else(out_of_range),
        iso8601::Duration::YMDHMS {
            year,
            month,
            day,
            hour,
            minute,
            second,
            millisecond,
        } => {
            let months = year
                .checked_mul(12)
                .and_then(|m| m.checked_add(month))
                .ok_or_else(out_of_range)?;

            let steps = [
                TimeDelta::try_days(i64::from(day)),
                TimeDelta::try_hours(i64::from(hour)),
                TimeDelta::try_minutes(i64::from(minute)),
                TimeDelta::try_seconds(i64::from(second)),
                TimeDelta::try_milliseconds(i64::from(millisecond)),
            ];

            steps
                .into_iter()
                .fold(now.checked_sub_months(Months::new(months)), |at, step| {
                    at.zip(step).and_then(|(at, step)| at.checked_sub_signed(step))
                })
                .ok_or_else(out_of_range)
        }
    }
}
