//! In-memory calendar source loaded from a JSON snapshot.
//!
//! A snapshot describes a handful of calendars: their identity, the
//! authorization handle a caller must present, raw events, and extra busy
//! spans (holds, out-of-office) that do not show up as events. Useful for
//! offline runs and for tests.
//!
//! ```json
//! {
//!   "calendars": [
//!     {
//!       "id": "alice@example.com",
//!       "auth": "token-alice",
//!       "events": [
//!         { "id": "e1", "start": "2026-03-16T14:00:00Z", "end": "2026-03-16T15:00:00Z",
//!           "title": "Standup" }
//!       ],
//!       "busy": [ { "start": "2026-03-17T13:00:00Z", "end": "2026-03-17T22:00:00Z" } ],
//!       "fail_with": { "kind": "quota_exceeded", "detail": "daily limit" }
//!     }
//!   ]
//! }
//! ```
//!
//! Free/busy answers are the union of a calendar's explicit busy spans and
//! its timed events, clipped to the queried range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::event::RawEvent;
use crate::source::{
    AuthHandle, BusyInterval, CalendarAccount, CalendarFailure, CalendarId, CalendarSource,
    CredentialSet, FetchOutcome, FreeBusyMap, SourceError, TimeRange,
};
use crate::temporal::parse_rfc3339;

/// A busy span as written in a snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusySpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One calendar in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCalendar {
    pub id: CalendarId,
    pub auth: AuthHandle,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub busy: Vec<BusySpan>,
    /// When set, every call for this calendar fails with this error.
    #[serde(default)]
    pub fail_with: Option<SourceError>,
}

/// A set of calendars, in the order they should be retrieved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub calendars: Vec<SnapshotCalendar>,
}

impl Snapshot {
    /// Parse and validate a snapshot document.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidSnapshot(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<()> {
        for (i, cal) in self.calendars.iter().enumerate() {
            if self.calendars[..i].iter().any(|c| c.id == cal.id) {
                return Err(EngineError::InvalidSnapshot(format!(
                    "calendar '{}' listed twice",
                    cal.id
                )));
            }
            if let Some(span) = cal.busy.iter().find(|b| b.start >= b.end) {
                return Err(EngineError::InvalidSnapshot(format!(
                    "calendar '{}' has an empty busy span starting {}",
                    cal.id, span.start
                )));
            }
        }
        Ok(())
    }

    /// Accounts for every calendar, carrying the handles the snapshot expects.
    pub fn credentials(&self) -> CredentialSet {
        self.calendars
            .iter()
            .map(|c| CalendarAccount {
                id: c.id.clone(),
                auth: c.auth.clone(),
            })
            .collect()
    }
}

/// [`CalendarSource`] backed by a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The calendar `account` refers to, if the handle is accepted.
    fn authorize(
        &self,
        account: &CalendarAccount,
    ) -> std::result::Result<&SnapshotCalendar, SourceError> {
        let calendar = self
            .snapshot
            .calendars
            .iter()
            .find(|c| c.id == account.id)
            .ok_or_else(|| {
                SourceError::Unavailable(format!("unknown calendar '{}'", account.id))
            })?;

        if calendar.auth != account.auth {
            return Err(SourceError::Unauthorized(format!(
                "handle rejected for '{}'",
                account.id
            )));
        }
        if let Some(error) = &calendar.fail_with {
            return Err(error.clone());
        }
        Ok(calendar)
    }

    fn busy_for(calendar: &SnapshotCalendar, range: &TimeRange) -> Vec<BusyInterval> {
        let from_spans = calendar.busy.iter().map(|span| (span.start, span.end));
        let from_events = calendar.events.iter().filter_map(event_instants);

        let mut busy: Vec<BusyInterval> = from_spans
            .chain(from_events)
            .filter_map(|(start, end)| {
                BusyInterval {
                    calendar: calendar.id.clone(),
                    start,
                    end,
                }
                .clip(range)
            })
            .collect();
        busy.sort_by_key(|b| (b.start, b.end));
        busy
    }
}

/// Parsed instants of a raw event, when it has a positive-length time range.
fn event_instants(raw: &RawEvent) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_rfc3339(raw.start.as_deref()?).ok()?;
    let end = parse_rfc3339(raw.end.as_deref()?).ok()?;
    (start < end).then_some((start, end))
}

impl CalendarSource for SnapshotSource {
    fn list_events(
        &self,
        account: &CalendarAccount,
        range: &TimeRange,
    ) -> std::result::Result<Vec<RawEvent>, SourceError> {
        let calendar = self.authorize(account)?;
        Ok(calendar
            .events
            .iter()
            .filter(|raw| match event_instants(raw) {
                Some((start, end)) => range.overlaps(start, end),
                // Untimed or malformed records are passed through; the
                // normalizer decides what to do with them.
                None => true,
            })
            .cloned()
            .collect())
    }

    fn query_free_busy(
        &self,
        accounts: &[CalendarAccount],
        range: &TimeRange,
    ) -> FetchOutcome<FreeBusyMap> {
        let mut map = FreeBusyMap::new();
        let mut failures = Vec::new();

        for account in accounts {
            match self.authorize(account) {
                Ok(calendar) => {
                    map.insert(account.id.clone(), Self::busy_for(calendar, range));
                }
                Err(error) => failures.push(CalendarFailure {
                    calendar: account.id.clone(),
                    error,
                }),
            }
        }

        FetchOutcome::from_parts(map, failures)
    }
}
