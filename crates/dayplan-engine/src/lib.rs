//! # dayplan-engine
//!
//! Deterministic daily schedule computation across multiple calendars.
//!
//! Given the events pulled from several calendars for one target day, the
//! engine detects time-overlap conflicts and proposes, for each displaced
//! event, the earliest free slot within a bounded horizon. Slots are only
//! offered when every calendar in the credential set is free, and no two
//! displaced events are ever offered overlapping slots in the same run.
//!
//! The engine never reads the system clock and never writes to a calendar:
//! callers pass the "now" anchor explicitly and render the resulting
//! [`DailyReport`] however they like.
//!
//! ## Modules
//!
//! - [`event`] — Raw provider records → normalized, sorted [`CalendarEvent`]s
//! - [`source`] — The [`CalendarSource`] capability (events + free/busy)
//! - [`snapshot`] — In-memory [`CalendarSource`] loaded from JSON
//! - [`conflict`] — Detect strictly overlapping event pairs
//! - [`slots`] — Candidate slot generator and [`SearchOptions`]
//! - [`ledger`] — Run-scoped record of already-proposed slots
//! - [`search`] — Earliest-free-slot search for a displaced event
//! - [`report`] — Structured report and deep-link rewriting
//! - [`engine`] — Per-run context and the [`summarize_day`] pipeline
//! - [`temporal`] — Timezone-aware date/time helpers
//! - [`error`] — Error types

pub mod conflict;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod report;
pub mod search;
pub mod slots;
pub mod snapshot;
pub mod source;
pub mod temporal;

pub use conflict::{find_conflicts, overlaps, Conflict};
pub use engine::{summarize_day, tomorrow, RunContext};
pub use error::EngineError;
pub use event::{normalize, normalize_all, CalendarEvent, EventKey, RawEvent};
pub use ledger::{SuggestionLedger, SuggestionSlot};
pub use report::{
    build_report, edit_link, ConflictEntry, DailyReport, EventSummary, SuggestionEntry,
    SuggestionOutcome,
};
pub use search::{find_slot, BusyCalendar, ProviderOperation, ProviderWarning, SearchOutcome};
pub use slots::{Candidate, CandidateSlots, SearchOptions, UnknownBusyPolicy};
pub use snapshot::{Snapshot, SnapshotSource};
pub use source::{
    AuthHandle, BusyInterval, CalendarAccount, CalendarFailure, CalendarId, CalendarSource,
    CredentialSet, FetchOutcome, FreeBusyMap, SourceError, TimeRange,
};
