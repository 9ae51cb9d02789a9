//! Event model and normalizer.
//!
//! Providers hand back loosely-shaped records: all-day entries carry no
//! instants, titles and links may be missing. [`normalize`] turns one record
//! into a [`CalendarEvent`] in the target timezone, or drops it.
//! [`normalize_all`] flattens per-calendar batches and sorts them by start.
//!
//! Dropping is silent for records without instants (they are legitimate
//! all-day events) and logged for records whose instants cannot be parsed
//! or do not form a positive duration.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::source::CalendarId;
use crate::temporal::parse_rfc3339;

const DEFAULT_TITLE: &str = "No Title";
const DEFAULT_LINK: &str = "#";

/// An event record as a provider returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub id: String,
    /// RFC 3339 start instant; absent for all-day events.
    #[serde(default)]
    pub start: Option<String>,
    /// RFC 3339 end instant; absent for all-day events.
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default, alias = "summary")]
    pub title: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default, alias = "html_link", alias = "htmlLink")]
    pub link: Option<String>,
}

/// A normalized event with concrete instants in the target timezone.
///
/// Invariant: `start < end`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub id: String,
    pub calendar: CalendarId,
    pub creator: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub title: String,
    pub link: String,
}

/// Identity of a physical event within one run.
///
/// The same meeting often shows up on several linked calendars with
/// different ids; title and time range are what they share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EventKey {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn key(&self) -> EventKey {
        EventKey {
            title: self.title.clone(),
            start: self.start.with_timezone(&Utc),
            end: self.end.with_timezone(&Utc),
        }
    }
}

/// Convert one raw record owned by `calendar` into a [`CalendarEvent`].
///
/// Returns `None` when the record lacks a start or an end, when either
/// cannot be parsed, or when `start >= end`.
pub fn normalize(calendar: &CalendarId, raw: &RawEvent, tz: &Tz) -> Option<CalendarEvent> {
    let (start, end) = match (raw.start.as_deref(), raw.end.as_deref()) {
        (Some(start), Some(end)) => (start, end),
        _ => return None,
    };

    let (start, end) = match (parse_rfc3339(start), parse_rfc3339(end)) {
        (Ok(start), Ok(end)) => (start, end),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(
                calendar = %calendar,
                event_id = %raw.id,
                error = %e,
                "dropping event with unparseable time"
            );
            return None;
        }
    };

    if start >= end {
        tracing::warn!(
            calendar = %calendar,
            event_id = %raw.id,
            "dropping event with non-positive duration"
        );
        return None;
    }

    Some(CalendarEvent {
        id: raw.id.clone(),
        calendar: calendar.clone(),
        creator: raw
            .creator
            .clone()
            .unwrap_or_else(|| calendar.as_str().to_string()),
        start: start.with_timezone(tz),
        end: end.with_timezone(tz),
        title: raw
            .title
            .clone()
            .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        link: raw.link.clone().unwrap_or_else(|| DEFAULT_LINK.to_string()),
    })
}

/// Normalize per-calendar batches and sort the result by start instant.
///
/// Batches are consumed in the order given and the sort is stable, so
/// events sharing a start keep their retrieval order.
pub fn normalize_all<I>(batches: I, tz: &Tz) -> Vec<CalendarEvent>
where
    I: IntoIterator<Item = (CalendarId, Vec<RawEvent>)>,
{
    let mut events: Vec<CalendarEvent> = batches
        .into_iter()
        .flat_map(|(calendar, raws)| {
            raws.iter()
                .filter_map(|raw| normalize(&calendar, raw, tz))
                .collect::<Vec<_>>()
        })
        .collect();
    events.sort_by_key(|event| event.start);
    events
}
