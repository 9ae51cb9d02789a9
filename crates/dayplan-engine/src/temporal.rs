//! Timezone-aware date/time helpers.
//!
//! Every instant the engine reasons about lives in one fixed target
//! timezone. The helpers here are the only place where wall-clock times are
//! turned into instants and back, so the rest of the crate never deals with
//! offsets or DST directly.
//!
//! All functions take explicit inputs (no system clock access); the caller
//! provides the "now" anchor when it is needed.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{EngineError, Result};

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string into `DateTime<Utc>`.
///
/// Provider payloads use both `Z` and explicit offsets; both are accepted.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::InvalidDatetime(format!("'{}': {}", s, e)))
}

/// Parse an IANA timezone string into `Tz`.
pub fn parse_timezone(s: &str) -> Result<Tz> {
    s.trim()
        .parse::<Tz>()
        .map_err(|_| EngineError::InvalidTimezone(format!("'{}'", s)))
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| EngineError::InvalidDatetime(format!("'{}': {}", s, e)))
}

// ── Wall-clock construction ─────────────────────────────────────────────────

/// The instant at which the wall clock in `tz` reads `time` on `date`.
///
/// Returns `None` for a nonexistent local time (spring-forward gap). An
/// ambiguous local time (fall-back overlap) resolves to the earlier instant.
pub fn local_instant(tz: &Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&date.and_time(time)).earliest()
}

/// The first instant at or after `from` on `date` whose wall-clock time
/// exists in `tz`, stepping a minute at a time while the time is before
/// `until`.
///
/// Used where a boundary (start of day, opening of business) may fall in a
/// DST gap and the next existing local time should take its place.
pub fn first_local_instant(
    tz: &Tz,
    date: NaiveDate,
    from: NaiveTime,
    until: NaiveTime,
) -> Option<DateTime<Tz>> {
    let step = Duration::minutes(1);
    let mut time = from;
    while time < until {
        if let Some(instant) = local_instant(tz, date, time) {
            return Some(instant);
        }
        let (next, wrapped) = time.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        time = next;
    }
    None
}

/// Half-open bounds `[00:00, next day 00:00)` of `date` in `tz`.
pub fn day_bounds(tz: &Tz, date: NaiveDate) -> Result<(DateTime<Tz>, DateTime<Tz>)> {
    let next = date
        .succ_opt()
        .ok_or_else(|| EngineError::InvalidDatetime(format!("no day after {date}")))?;
    let start = start_of_day(tz, date)?;
    let end = start_of_day(tz, next)?;
    Ok((start, end))
}

/// First instant of `date` in `tz`.
///
/// A few zones skip midnight on DST days; the first existing local time of
/// the day is used instead.
fn start_of_day(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default();
    let limit = NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default();
    first_local_instant(tz, date, midnight, limit)
        .ok_or_else(|| {
            EngineError::InvalidDatetime(format!("no start of day for {date} in {}", tz.name()))
        })
}

/// Whether `date` falls on a Saturday or a Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

// ── Display ─────────────────────────────────────────────────────────────────

/// 12-hour clock time, e.g. `"09:30 AM"`.
pub fn format_clock<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    dt.format("%I:%M %p").to_string()
}

/// Weekday and date without the year, e.g. `"Monday, March 16"`.
pub fn format_day<T: TimeZone>(dt: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    dt.format("%A, %B %d").to_string()
}

/// Full date heading, e.g. `"Monday, March 16, 2026"`.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}

/// `H:MM:SS`, prefixed with a day count when the duration spans days,
/// e.g. `"1:30:00"` or `"2 days, 3:00:00"`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let abs = total.unsigned_abs();

    let days = abs / 86400;
    let remainder = abs % 86400;
    let hours = remainder / 3600;
    let minutes = (remainder % 3600) / 60;
    let seconds = remainder % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => format!("{sign}{clock}"),
        1 => format!("{sign}1 day, {clock}"),
        n => format!("{sign}{n} days, {clock}"),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
