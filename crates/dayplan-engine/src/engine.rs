//! Per-run context and the daily summary pipeline.
//!
//! A run is: fetch every calendar's events for the target day, normalize
//! and sort them, detect conflicts, then walk the conflicts in order and
//! search a replacement slot for the first event of each pair. Everything
//! mutable (the suggestion ledger, the set of events already handled, the
//! busy-data cache) belongs to one run and is dropped with it.
//!
//! The pipeline is sequential on purpose: the ledger's collision guard is
//! order-dependent, so suggestions must be made in conflict order for the
//! result to be reproducible.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::conflict::{find_conflicts, Conflict};
use crate::error::{EngineError, Result};
use crate::event::{normalize_all, CalendarEvent, EventKey};
use crate::ledger::SuggestionLedger;
use crate::report::{build_report, DailyReport};
use crate::search::{find_slot, BusyCalendar, ProviderOperation, ProviderWarning, SearchOutcome};
use crate::slots::SearchOptions;
use crate::source::{CalendarSource, CredentialSet, TimeRange};
use crate::temporal::day_bounds;

/// State owned by a single run.
#[derive(Debug)]
pub struct RunContext {
    tz: Tz,
    date: NaiveDate,
    now: DateTime<Utc>,
    options: SearchOptions,
    ledger: SuggestionLedger,
    processed: HashSet<EventKey>,
}

impl RunContext {
    /// Start a run summarizing `date` in `tz`, with `now` as the present.
    pub fn new(
        tz: Tz,
        date: NaiveDate,
        now: DateTime<Utc>,
        options: SearchOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            tz,
            date,
            now,
            options,
            ledger: SuggestionLedger::new(),
            processed: HashSet::new(),
        })
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    pub fn ledger(&self) -> &SuggestionLedger {
        &self.ledger
    }

    /// Fetch, normalize and sort the target day's events.
    ///
    /// A calendar whose events cannot be listed contributes nothing; the
    /// failure is appended to `warnings` and the run carries on.
    pub fn collect_events<S: CalendarSource + ?Sized>(
        &self,
        source: &S,
        credentials: &CredentialSet,
        warnings: &mut Vec<ProviderWarning>,
    ) -> Result<Vec<CalendarEvent>> {
        let (start, end) = day_bounds(&self.tz, self.date)?;
        let range = TimeRange::new(start.with_timezone(&Utc), end.with_timezone(&Utc));

        let mut batches = Vec::with_capacity(credentials.len());
        for account in credentials.accounts() {
            match source.list_events(account, &range) {
                Ok(raws) => {
                    tracing::debug!(calendar = %account.id, count = raws.len(), "fetched events");
                    batches.push((account.id.clone(), raws));
                }
                Err(error) => {
                    tracing::warn!(calendar = %account.id, %error, "could not list events");
                    warnings.push(ProviderWarning {
                        calendar: Some(account.id.clone()),
                        operation: ProviderOperation::ListEvents,
                        day: self.date,
                        error,
                    });
                }
            }
        }

        Ok(normalize_all(batches, &self.tz))
    }

    /// Search a slot for the displaced event of each conflict, in order.
    ///
    /// An event that appears in several conflicts (or on several calendars
    /// with the same title and times) is searched for once, at its first
    /// conflict.
    pub fn suggest<S: CalendarSource + ?Sized>(
        &mut self,
        events: &[CalendarEvent],
        conflicts: &[Conflict],
        busy: &mut BusyCalendar<'_, S>,
    ) -> Vec<(usize, SearchOutcome)> {
        let mut searches = Vec::new();

        for (index, conflict) in conflicts.iter().enumerate() {
            let displaced = &events[conflict.first];
            if !self.processed.insert(displaced.key()) {
                continue;
            }

            let outcome = find_slot(
                displaced,
                self.date,
                self.now,
                &self.options,
                &mut self.ledger,
                busy,
            );
            match &outcome {
                SearchOutcome::Placed(slot) => {
                    tracing::debug!(title = %displaced.title, start = %slot.start, "proposed slot");
                }
                SearchOutcome::Exhausted { .. } => {
                    tracing::info!(title = %displaced.title, "no free slot within horizon");
                }
                SearchOutcome::Invalid { reason } => {
                    tracing::warn!(title = %displaced.title, %reason, "search skipped");
                }
            }
            searches.push((index, outcome));
        }

        searches
    }

    /// Run the whole pipeline and build the report.
    pub fn run<S: CalendarSource + ?Sized>(
        mut self,
        source: &S,
        credentials: &CredentialSet,
    ) -> Result<DailyReport> {
        let mut warnings = Vec::new();
        let events = self.collect_events(source, credentials, &mut warnings)?;
        let conflicts = find_conflicts(&events);

        let mut busy = BusyCalendar::new(source, credentials.accounts(), self.tz, &self.options);
        let searches = self.suggest(&events, &conflicts, &mut busy);
        warnings.extend(busy.into_warnings());

        tracing::info!(
            date = %self.date,
            events = events.len(),
            conflicts = conflicts.len(),
            proposed = self.ledger.len(),
            warnings = warnings.len(),
            "day summarized"
        );

        Ok(build_report(
            self.date, self.tz, self.now, events, &conflicts, searches, warnings,
        ))
    }
}

/// Summarize `date` across every calendar in `credentials`.
///
/// Provider failures never abort the run; they are reported in
/// [`DailyReport::warnings`]. Errors are returned only for invalid input
/// (bad options, a date with no representable bounds).
pub fn summarize_day<S: CalendarSource + ?Sized>(
    source: &S,
    credentials: &CredentialSet,
    tz: Tz,
    date: NaiveDate,
    now: DateTime<Utc>,
    options: SearchOptions,
) -> Result<DailyReport> {
    RunContext::new(tz, date, now, options)?.run(source, credentials)
}

/// The calendar day after `now` in `tz`.
pub fn tomorrow(now: DateTime<Utc>, tz: Tz) -> Result<NaiveDate> {
    let today = now.with_timezone(&tz).date_naive();
    today
        .succ_opt()
        .ok_or_else(|| EngineError::InvalidDatetime(format!("no day after {today}")))
}
