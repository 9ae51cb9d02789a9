//! Earliest-free-slot search for a displaced event.
//!
//! Candidates come from [`SearchOptions::candidates`] in priority order; the
//! first one that passes every acceptance check wins:
//!
//! 1. the slot ends at or before close of business on its day,
//! 2. it starts strictly after "now",
//! 3. it does not overlap a slot already proposed in this run,
//! 4. it does not overlap any busy interval on any linked calendar.
//!
//! Busy data is fetched lazily per candidate day through [`BusyCalendar`],
//! which also decides what an unanswered calendar means (see
//! [`UnknownBusyPolicy`]).

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::conflict::overlaps;
use crate::event::CalendarEvent;
use crate::ledger::{SuggestionLedger, SuggestionSlot};
use crate::slots::{SearchOptions, UnknownBusyPolicy};
use crate::source::{
    BusyInterval, CalendarAccount, CalendarId, CalendarSource, FetchOutcome, SourceError,
    TimeRange,
};
use crate::temporal::{first_local_instant, local_instant};

// ── Provider warnings ───────────────────────────────────────────────────────

/// Which provider call a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderOperation {
    ListEvents,
    FreeBusy,
}

/// A provider failure that degraded the run without aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderWarning {
    /// The calendar that failed, or `None` when the whole call failed.
    pub calendar: Option<CalendarId>,
    pub operation: ProviderOperation,
    pub day: NaiveDate,
    pub error: SourceError,
}

// ── Busy data ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct DayBusy {
    intervals: Vec<BusyInterval>,
    unknown: Vec<CalendarId>,
}

/// Per-run, per-day view of busy time across every linked calendar.
///
/// A day is fetched the first time it is consulted and reused for the rest
/// of the run. Nothing outlives the run.
pub struct BusyCalendar<'a, S: ?Sized> {
    source: &'a S,
    accounts: &'a [CalendarAccount],
    tz: Tz,
    day_start: NaiveTime,
    day_end: NaiveTime,
    days: HashMap<NaiveDate, DayBusy>,
    warnings: Vec<ProviderWarning>,
    queries: usize,
}

impl<'a, S: CalendarSource + ?Sized> BusyCalendar<'a, S> {
    pub fn new(
        source: &'a S,
        accounts: &'a [CalendarAccount],
        tz: Tz,
        options: &SearchOptions,
    ) -> Self {
        Self {
            source,
            accounts,
            tz,
            day_start: options.day_start,
            day_end: options.day_end,
            days: HashMap::new(),
            warnings: Vec::new(),
            queries: 0,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Failures seen so far, in the order they happened.
    pub fn warnings(&self) -> &[ProviderWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<ProviderWarning> {
        self.warnings
    }

    /// Number of free/busy queries issued so far.
    pub fn queries(&self) -> usize {
        self.queries
    }

    /// Whether `[start, end)` on `day` is free on every calendar.
    pub fn is_free(
        &mut self,
        day: NaiveDate,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        policy: UnknownBusyPolicy,
    ) -> bool {
        let busy = self.day(day);
        if !busy.unknown.is_empty() && policy == UnknownBusyPolicy::Exclude {
            return false;
        }
        !busy
            .intervals
            .iter()
            .any(|b| overlaps(b.start, b.end, start, end))
    }

    fn day(&mut self, day: NaiveDate) -> &DayBusy {
        if !self.days.contains_key(&day) {
            let fetched = self.fetch(day);
            self.days.insert(day, fetched);
        }
        &self.days[&day]
    }

    /// The business window of `day` as instants. A boundary that falls in a
    /// DST gap moves to the next existing local time.
    fn window(&self, day: NaiveDate) -> Option<TimeRange> {
        let last_minute = NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default();
        let open = first_local_instant(&self.tz, day, self.day_start, self.day_end)?;
        let close = local_instant(&self.tz, day, self.day_end)
            .or_else(|| first_local_instant(&self.tz, day, self.day_end, last_minute))?;
        (open < close).then(|| {
            TimeRange::new(open.with_timezone(&Utc), close.with_timezone(&Utc))
        })
    }

    fn fetch(&mut self, day: NaiveDate) -> DayBusy {
        let Some(window) = self.window(day) else {
            let error = SourceError::Unavailable(format!(
                "no business window on {day} in {}",
                self.tz.name()
            ));
            tracing::warn!(%day, %error, "free/busy not queried");
            self.warnings.push(ProviderWarning {
                calendar: None,
                operation: ProviderOperation::FreeBusy,
                day,
                error,
            });
            return DayBusy {
                intervals: Vec::new(),
                unknown: self.accounts.iter().map(|a| a.id.clone()).collect(),
            };
        };

        self.queries += 1;
        tracing::debug!(%day, calendars = self.accounts.len(), "querying free/busy");

        let clip = |map: crate::source::FreeBusyMap| -> Vec<BusyInterval> {
            map.into_values()
                .flatten()
                .filter_map(|b| b.clip(&window))
                .collect()
        };

        match self.source.query_free_busy(self.accounts, &window) {
            FetchOutcome::Complete(map) => DayBusy {
                intervals: clip(map),
                unknown: Vec::new(),
            },
            FetchOutcome::Partial { data, failures } => {
                let mut unknown = Vec::with_capacity(failures.len());
                for failure in failures {
                    tracing::warn!(
                        calendar = %failure.calendar,
                        %day,
                        error = %failure.error,
                        "free/busy unavailable for calendar"
                    );
                    unknown.push(failure.calendar.clone());
                    self.warnings.push(ProviderWarning {
                        calendar: Some(failure.calendar),
                        operation: ProviderOperation::FreeBusy,
                        day,
                        error: failure.error,
                    });
                }
                DayBusy {
                    intervals: clip(data),
                    unknown,
                }
            }
            FetchOutcome::Failed(error) => {
                tracing::warn!(%day, %error, "free/busy query failed");
                self.warnings.push(ProviderWarning {
                    calendar: None,
                    operation: ProviderOperation::FreeBusy,
                    day,
                    error,
                });
                DayBusy {
                    intervals: Vec::new(),
                    unknown: self.accounts.iter().map(|a| a.id.clone()).collect(),
                }
            }
        }
    }
}

// ── Search ──────────────────────────────────────────────────────────────────

/// Result of searching for a replacement slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// A slot was found and reserved in the ledger.
    Placed(SuggestionSlot),
    /// Nothing in the horizon satisfied every check.
    Exhausted { duration: Duration },
    /// The event cannot be searched for; the ledger was not touched.
    Invalid { reason: String },
}

/// Find and reserve the earliest acceptable slot for `event`.
///
/// The search starts on `first_day` and never returns a slot that starts
/// at or before `now`. On success the slot is already in `ledger`.
pub fn find_slot<S: CalendarSource + ?Sized>(
    event: &CalendarEvent,
    first_day: NaiveDate,
    now: DateTime<Utc>,
    options: &SearchOptions,
    ledger: &mut SuggestionLedger,
    busy: &mut BusyCalendar<'_, S>,
) -> SearchOutcome {
    let duration = event.duration();
    if duration <= Duration::zero() {
        return SearchOutcome::Invalid {
            reason: format!("'{}' has non-positive duration", event.title),
        };
    }

    for candidate in options.candidates(busy.timezone(), first_day) {
        let start = candidate.start;
        let end = start + duration;

        if end > candidate.close || start <= now {
            continue;
        }
        if ledger.collides(start, end) {
            tracing::debug!(title = %event.title, %start, "candidate already proposed this run");
            continue;
        }
        if !busy.is_free(candidate.day, start, end, options.unknown_busy) {
            continue;
        }

        let slot = SuggestionSlot {
            event: event.key(),
            start,
            end,
        };
        return match ledger.reserve(slot.clone()) {
            Ok(()) => SearchOutcome::Placed(slot),
            Err(e) => SearchOutcome::Invalid {
                reason: e.to_string(),
            },
        };
    }

    SearchOutcome::Exhausted { duration }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RawEvent;
    use crate::source::{CalendarFailure, FreeBusyMap};
    use chrono::{NaiveTime, TimeZone, Timelike};
    use std::cell::Cell;

    const TZ: Tz = chrono_tz::America::Chicago;

    /// Busy data per calendar; calendars in `failing` never answer.
    #[derive(Default)]
    struct FakeSource {
        busy: Vec<BusyInterval>,
        failing: Vec<CalendarId>,
        down: bool,
        calls: Cell<usize>,
    }

    impl CalendarSource for FakeSource {
        fn list_events(
            &self,
            _account: &CalendarAccount,
            _range: &TimeRange,
        ) -> Result<Vec<RawEvent>, SourceError> {
            Ok(Vec::new())
        }

        fn query_free_busy(
            &self,
            accounts: &[CalendarAccount],
            range: &TimeRange,
        ) -> FetchOutcome<FreeBusyMap> {
            self.calls.set(self.calls.get() + 1);
            if self.down {
                return FetchOutcome::Failed(SourceError::Network("unreachable".into()));
            }
            let mut map = FreeBusyMap::new();
            let mut failures = Vec::new();
            for account in accounts {
                if self.failing.contains(&account.id) {
                    failures.push(CalendarFailure {
                        calendar: account.id.clone(),
                        error: SourceError::Unauthorized("token expired".into()),
                    });
                    continue;
                }
                let entries = self
                    .busy
                    .iter()
                    .filter(|b| b.calendar == account.id)
                    .filter_map(|b| b.clip(range))
                    .collect();
                map.insert(account.id.clone(), entries);
            }
            FetchOutcome::from_parts(map, failures)
        }
    }

    fn accounts() -> Vec<CalendarAccount> {
        vec![
            CalendarAccount::new("a@example.com", "ta"),
            CalendarAccount::new("b@example.com", "tb"),
        ]
    }

    fn local(day: u32, h: u32, m: u32) -> DateTime<Tz> {
        TZ.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
    }

    fn busy(calendar: &str, day: u32, start: (u32, u32), end: (u32, u32)) -> BusyInterval {
        BusyInterval {
            calendar: CalendarId::new(calendar),
            start: local(day, start.0, start.1).with_timezone(&Utc),
            end: local(day, end.0, end.1).with_timezone(&Utc),
        }
    }

    fn event(title: &str, day: u32, start: (u32, u32), end: (u32, u32)) -> CalendarEvent {
        CalendarEvent {
            id: title.to_string(),
            calendar: CalendarId::new("a@example.com"),
            creator: "a@example.com".to_string(),
            start: local(day, start.0, start.1),
            end: local(day, end.0, end.1),
            title: title.to_string(),
            link: "#".to_string(),
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()
    }

    /// Sunday evening before the target Monday.
    fn sunday_night() -> DateTime<Utc> {
        local(15, 20, 0).with_timezone(&Utc)
    }

    fn placed(outcome: SearchOutcome) -> SuggestionSlot {
        match outcome {
            SearchOutcome::Placed(slot) => slot,
            other => panic!("expected a placed slot, got {other:?}"),
        }
    }

    #[test]
    fn test_first_free_slot_is_earliest_business_start() {
        let source = FakeSource::default();
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let slot = placed(find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(slot.start, local(16, 8, 0));
        assert_eq!(slot.end, local(16, 9, 0));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_busy_on_any_calendar_blocks_slot() {
        let source = FakeSource {
            busy: vec![
                busy("a@example.com", 16, (8, 0), (9, 0)),
                busy("b@example.com", 16, (9, 0), (10, 30)),
            ],
            ..Default::default()
        };
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let slot = placed(find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(slot.start, local(16, 10, 30));
    }

    #[test]
    fn test_slot_never_starts_at_or_before_now() {
        let source = FakeSource::default();
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let now = local(16, 10, 0).with_timezone(&Utc);
        let e = event("Sync", 16, (9, 0), (10, 0));
        let slot = placed(find_slot(
            &e,
            monday(),
            now,
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(slot.start, local(16, 10, 30));
    }

    #[test]
    fn test_slot_must_end_by_close_of_business() {
        let source = FakeSource {
            busy: vec![busy("a@example.com", 16, (8, 0), (15, 0))],
            ..Default::default()
        };
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        // 3 hours from 15:00 would end at 18:00; next day 08:00 instead.
        let e = event("Workshop", 16, (9, 0), (12, 0));
        let slot = placed(find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(slot.start, local(17, 8, 0));
        assert!(slot.end.hour() <= 17);
    }

    #[test]
    fn test_event_longer_than_business_day_exhausts() {
        let source = FakeSource::default();
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Offsite", 16, (7, 0), (17, 0));
        let outcome = find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        );
        assert_eq!(
            outcome,
            SearchOutcome::Exhausted {
                duration: Duration::hours(10)
            }
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_fully_busy_horizon_exhausts() {
        let busy_days = (16..=27)
            .map(|day| busy("b@example.com", day, (8, 0), (17, 0)))
            .collect();
        let source = FakeSource {
            busy: busy_days,
            ..Default::default()
        };
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let outcome = find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        );
        assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));
        // One query per weekday, none for weekends.
        assert_eq!(busy.queries(), 10);
    }

    #[test]
    fn test_ledger_collision_moves_second_event() {
        let source = FakeSource::default();
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let first = event("First", 16, (9, 0), (10, 0));
        let second = event("Second", 16, (11, 0), (12, 0));
        let a = placed(find_slot(
            &first,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        ));
        let b = placed(find_slot(
            &second,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(a.start, local(16, 8, 0));
        assert_eq!(b.start, local(16, 9, 0));
        // Busy data for Monday was fetched once and reused.
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn test_unknown_calendar_excludes_day_by_default() {
        let source = FakeSource {
            failing: vec![CalendarId::new("b@example.com")],
            ..Default::default()
        };
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let outcome = find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        );
        assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));
        assert_eq!(busy.warnings().len(), 10);
        assert_eq!(
            busy.warnings()[0].calendar,
            Some(CalendarId::new("b@example.com"))
        );
    }

    #[test]
    fn test_unknown_calendar_assumed_free_when_configured() {
        let source = FakeSource {
            failing: vec![CalendarId::new("b@example.com")],
            busy: vec![busy("a@example.com", 16, (8, 0), (9, 0))],
            ..Default::default()
        };
        let accounts = accounts();
        let options = SearchOptions {
            unknown_busy: UnknownBusyPolicy::AssumeFree,
            ..Default::default()
        };
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let slot = placed(find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(slot.start, local(16, 9, 0));
        assert_eq!(busy.warnings().len(), 1);
    }

    #[test]
    fn test_failed_query_marks_every_calendar_unknown() {
        let source = FakeSource {
            down: true,
            ..Default::default()
        };
        let accounts = accounts();
        let options = SearchOptions {
            horizon_days: 1,
            ..Default::default()
        };
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let outcome = find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        );
        assert!(matches!(outcome, SearchOutcome::Exhausted { .. }));
        let warnings = busy.into_warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].calendar, None);
        assert_eq!(warnings[0].operation, ProviderOperation::FreeBusy);
    }

    #[test]
    fn test_invalid_duration_leaves_ledger_untouched() {
        let source = FakeSource::default();
        let accounts = accounts();
        let options = SearchOptions::default();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let mut e = event("Broken", 16, (9, 0), (10, 0));
        e.end = e.start;
        let outcome = find_slot(
            &e,
            monday(),
            sunday_night(),
            &options,
            &mut ledger,
            &mut busy,
        );
        assert!(matches!(outcome, SearchOutcome::Invalid { .. }));
        assert!(ledger.is_empty());
        assert_eq!(source.calls.get(), 0);
    }

    #[test]
    fn test_custom_business_window() {
        let source = FakeSource::default();
        let accounts = accounts();
        let options = SearchOptions {
            day_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            day_end: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            step_minutes: 15,
            ..Default::default()
        };
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, TZ, &options);

        let now = local(16, 10, 5).with_timezone(&Utc);
        let e = event("Sync", 16, (9, 0), (9, 30));
        let slot = placed(find_slot(
            &e,
            monday(),
            now,
            &options,
            &mut ledger,
            &mut busy,
        ));
        assert_eq!(slot.start, local(16, 10, 15));
    }

    // Cairo springs forward 00:00 -> 01:00 on Friday 2026-04-24.
    const CAIRO: Tz = chrono_tz::Africa::Cairo;

    fn cairo_gap_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 24).unwrap()
    }

    fn midnight_opening() -> SearchOptions {
        SearchOptions {
            day_start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            horizon_days: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_opening_in_dst_gap_still_queries_busy_data() {
        let whole_day = |calendar: &str| BusyInterval {
            calendar: CalendarId::new(calendar),
            start: Utc.with_ymd_and_hms(2026, 4, 23, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 4, 25, 0, 0, 0).unwrap(),
        };
        let source = FakeSource {
            busy: vec![whole_day("a@example.com"), whole_day("b@example.com")],
            ..Default::default()
        };
        let accounts = accounts();
        let options = midnight_opening();
        let mut ledger = SuggestionLedger::new();
        let mut busy = BusyCalendar::new(&source, &accounts, CAIRO, &options);

        let e = event("Sync", 16, (9, 0), (10, 0));
        let now = Utc.with_ymd_and_hms(2026, 4, 20, 12, 0, 0).unwrap();
        let outcome = find_slot(&e, cairo_gap_day(), now, &options, &mut ledger, &mut busy);

        assert!(
            matches!(outcome, SearchOutcome::Exhausted { .. }),
            "got {outcome:?}"
        );
        assert_eq!(busy.queries(), 1);
        assert!(busy.warnings().is_empty());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_day_without_business_window_is_unknown() {
        let source = FakeSource::default();
        let accounts = accounts();
        // The whole window sits inside the gap.
        let options = SearchOptions {
            day_end: NaiveTime::from_hms_opt(0, 30, 0).unwrap(),
            ..midnight_opening()
        };
        let mut busy = BusyCalendar::new(&source, &accounts, CAIRO, &options);

        let start = CAIRO.with_ymd_and_hms(2026, 4, 24, 2, 0, 0).unwrap();
        let end = start + Duration::minutes(30);
        assert!(!busy.is_free(cairo_gap_day(), start, end, UnknownBusyPolicy::Exclude));
        assert_eq!(busy.queries(), 0);
        assert_eq!(source.calls.get(), 0);

        let warnings = busy.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].calendar, None);
        assert_eq!(warnings[0].operation, ProviderOperation::FreeBusy);
        assert!(matches!(warnings[0].error, SourceError::Unavailable(_)));
    }
}
