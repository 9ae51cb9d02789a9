//! The calendar-source capability the engine depends on.
//!
//! Concrete adapters (Google Calendar, CalDAV, an in-memory [`Snapshot`])
//! implement [`CalendarSource`]. The engine only ever sees identities,
//! opaque authorization handles, raw event records, and busy intervals.
//!
//! Free/busy answers come back as a [`FetchOutcome`], which keeps "this
//! calendar could not be queried" distinct from "this calendar is free".
//!
//! [`Snapshot`]: crate::snapshot::Snapshot

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::RawEvent;

// ── Identities ──────────────────────────────────────────────────────────────

/// A calendar identity, usually the owner's email address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalendarId(pub String);

impl CalendarId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An opaque authorization handle (token reference, session key, ...).
///
/// The engine never inspects it; it is passed back to the source verbatim.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthHandle(pub String);

impl AuthHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }
}

impl fmt::Debug for AuthHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthHandle(..)")
    }
}

/// One calendar the run may read, with its authorization handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarAccount {
    pub id: CalendarId,
    pub auth: AuthHandle,
}

impl CalendarAccount {
    pub fn new(id: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            id: CalendarId::new(id),
            auth: AuthHandle::new(auth),
        }
    }
}

/// The calendars linked for one run, in retrieval order.
///
/// Order matters: it is the tie-breaker for events that start at the same
/// instant, and therefore for conflict and suggestion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    accounts: Vec<CalendarAccount>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account. A second account with the same identity replaces
    /// the handle of the first and keeps its position.
    pub fn insert(&mut self, account: CalendarAccount) {
        match self.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => existing.auth = account.auth,
            None => self.accounts.push(account),
        }
    }

    pub fn accounts(&self) -> &[CalendarAccount] {
        &self.accounts
    }

    pub fn ids(&self) -> impl Iterator<Item = &CalendarId> {
        self.accounts.iter().map(|a| &a.id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

impl FromIterator<CalendarAccount> for CredentialSet {
    fn from_iter<I: IntoIterator<Item = CalendarAccount>>(iter: I) -> Self {
        let mut set = Self::new();
        for account in iter {
            set.insert(account);
        }
        set
    }
}

// ── Ranges and busy data ────────────────────────────────────────────────────

/// A half-open `[start, end)` range of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Whether this range strictly overlaps `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        crate::conflict::overlaps(self.start, self.end, start, end)
    }
}

/// A busy period reported for one calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusyInterval {
    pub calendar: CalendarId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// Restrict the interval to `range`. Returns `None` when nothing of it
    /// falls inside the range.
    pub fn clip(&self, range: &TimeRange) -> Option<BusyInterval> {
        let start = self.start.max(range.start);
        let end = self.end.min(range.end);
        (start < end).then(|| BusyInterval {
            calendar: self.calendar.clone(),
            start,
            end,
        })
    }
}

/// Busy intervals keyed by calendar.
pub type FreeBusyMap = BTreeMap<CalendarId, Vec<BusyInterval>>;

// ── Failures ────────────────────────────────────────────────────────────────

/// Why a source could not answer for a calendar.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum SourceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),
}

/// A single calendar that could not be answered for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarFailure {
    pub calendar: CalendarId,
    pub error: SourceError,
}

/// Result of a multi-calendar query.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Every calendar answered.
    Complete(T),
    /// Some calendars answered; `failures` lists the rest.
    Partial {
        data: T,
        failures: Vec<CalendarFailure>,
    },
    /// Nothing could be answered.
    Failed(SourceError),
}

impl<T> FetchOutcome<T> {
    /// Build an outcome from per-calendar results collected into `data`.
    pub fn from_parts(data: T, failures: Vec<CalendarFailure>) -> Self {
        if failures.is_empty() {
            FetchOutcome::Complete(data)
        } else {
            FetchOutcome::Partial { data, failures }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, FetchOutcome::Complete(_))
    }
}

// ── Capability ──────────────────────────────────────────────────────────────

/// A provider of events and free/busy data.
///
/// Calls are blocking I/O boundaries. Implementations should bound each
/// call with a timeout and report it as [`SourceError::Timeout`]; the
/// engine treats that like any other per-calendar failure.
pub trait CalendarSource {
    /// Raw events of one calendar that intersect `range`.
    fn list_events(
        &self,
        account: &CalendarAccount,
        range: &TimeRange,
    ) -> Result<Vec<RawEvent>, SourceError>;

    /// Busy intervals for each of `accounts` within `range`.
    fn query_free_busy(
        &self,
        accounts: &[CalendarAccount],
        range: &TimeRange,
    ) -> FetchOutcome<FreeBusyMap>;
}

impl<S: CalendarSource + ?Sized> CalendarSource for &S {
    fn list_events(
        &self,
        account: &CalendarAccount,
        range: &TimeRange,
    ) -> Result<Vec<RawEvent>, SourceError> {
        (**self).list_events(account, range)
    }

    fn query_free_busy(
        &self,
        accounts: &[CalendarAccount],
        range: &TimeRange,
    ) -> FetchOutcome<FreeBusyMap> {
        (**self).query_free_busy(accounts, range)
    }
}
