//! Structured result of a run.
//!
//! [`build_report`] assembles the sorted events, the conflicts between
//! them, and the outcome of every reschedule search into a [`DailyReport`].
//! Rendering (HTML, email, terminal) is left entirely to the caller; the
//! report only carries data, plus a rewritten deep link so a suggestion can
//! open the event directly in edit mode.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::conflict::Conflict;
use crate::event::CalendarEvent;
use crate::search::{ProviderWarning, SearchOutcome};

/// Rewrite a calendar web link so it opens the event editor.
///
/// Only Google Calendar links that identify an event (`eid=` parameter)
/// are rewritten, `/event?` becoming `/eventedit?`. Anything else is
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use dayplan_engine::report::edit_link;
///
/// assert_eq!(
///     edit_link("https://www.google.com/calendar/event?eid=abc123"),
///     "https://www.google.com/calendar/event?eid=abc123",
/// );
/// assert_eq!(
///     edit_link("https://calendar.google.com/calendar/event?eid=abc123"),
///     "https://calendar.google.com/calendar/eventedit?eid=abc123",
/// );
/// ```
pub fn edit_link(link: &str) -> String {
    if link.contains("calendar.google.com") && link.contains("eid=") {
        link.replace("/event?", "/eventedit?")
    } else {
        link.to_string()
    }
}

/// Compact description of an event for conflict and suggestion lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub link: String,
}

impl From<&CalendarEvent> for EventSummary {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            title: event.title.clone(),
            start: event.start,
            end: event.end,
            link: event.link.clone(),
        }
    }
}

/// One conflicting pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictEntry {
    pub first: EventSummary,
    pub second: EventSummary,
    pub overlap_minutes: i64,
}

/// What the search produced for a displaced event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SuggestionOutcome {
    /// A free slot, reserved for this event for the rest of the run.
    Proposed {
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        edit_link: String,
    },
    /// No acceptable slot within the horizon. Carries the displaced
    /// event's length in whole seconds.
    NoSlot { duration_seconds: i64 },
    /// The event could not be searched for.
    Skipped { reason: String },
}

/// Suggestion for the displaced event of one conflict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionEntry {
    /// Index into [`DailyReport::conflicts`] of the conflict that displaced
    /// the event.
    pub conflict: usize,
    pub event: EventSummary,
    pub outcome: SuggestionOutcome,
}

/// Everything a renderer needs to describe one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub timezone: String,
    pub generated_at: DateTime<Utc>,
    pub events: Vec<CalendarEvent>,
    pub conflicts: Vec<ConflictEntry>,
    pub suggestions: Vec<SuggestionEntry>,
    pub warnings: Vec<ProviderWarning>,
}

impl DailyReport {
    /// No event with concrete times on the target day.
    pub fn is_free_day(&self) -> bool {
        self.events.is_empty()
    }

    /// The suggestion triggered by conflict `index`, if that conflict
    /// displaced an event not already handled earlier in the run.
    pub fn suggestion_for(&self, index: usize) -> Option<&SuggestionEntry> {
        self.suggestions.iter().find(|s| s.conflict == index)
    }

    pub fn proposed(&self) -> impl Iterator<Item = &SuggestionEntry> {
        self.suggestions
            .iter()
            .filter(|s| matches!(s.outcome, SuggestionOutcome::Proposed { .. }))
    }
}

/// Assemble a report.
///
/// `searches` pairs each conflict index with the search outcome for the
/// event it displaced, in the order the searches ran.
pub fn build_report(
    date: NaiveDate,
    tz: Tz,
    now: DateTime<Utc>,
    events: Vec<CalendarEvent>,
    conflicts: &[Conflict],
    searches: Vec<(usize, SearchOutcome)>,
    warnings: Vec<ProviderWarning>,
) -> DailyReport {
    let conflict_entries = conflicts
        .iter()
        .map(|c| ConflictEntry {
            first: EventSummary::from(&events[c.first]),
            second: EventSummary::from(&events[c.second]),
            overlap_minutes: c.overlap_minutes,
        })
        .collect();

    let suggestions = searches
        .into_iter()
        .map(|(index, outcome)| {
            let displaced = &events[conflicts[index].first];
            let outcome = match outcome {
                SearchOutcome::Placed(slot) => SuggestionOutcome::Proposed {
                    start: slot.start,
                    end: slot.end,
                    edit_link: edit_link(&displaced.link),
                },
                SearchOutcome::Exhausted { duration } => SuggestionOutcome::NoSlot {
                    duration_seconds: duration.num_seconds(),
                },
                SearchOutcome::Invalid { reason } => SuggestionOutcome::Skipped { reason },
            };
            SuggestionEntry {
                conflict: index,
                event: EventSummary::from(displaced),
                outcome,
            }
        })
        .collect();

    DailyReport {
        date,
        timezone: tz.name().to_string(),
        generated_at: now,
        events,
        conflicts: conflict_entries,
        suggestions,
        warnings,
    }
}
