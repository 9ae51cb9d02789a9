//! Run-scoped record of proposed slots.
//!
//! Once a slot is offered to one displaced event it stays reserved for the
//! rest of the run, so a later displaced event is never offered an
//! overlapping slot. The ledger grows monotonically and is dropped with the
//! run; nothing is persisted, so two independent runs may still propose the
//! same slot.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

use crate::conflict::overlaps;
use crate::error::{EngineError, Result};
use crate::event::EventKey;

/// A proposed replacement slot for a displaced event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionSlot {
    pub event: EventKey,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl SuggestionSlot {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// The slots accepted so far in one run.
///
/// Invariant: no two reserved slots strictly overlap.
#[derive(Debug, Clone, Default)]
pub struct SuggestionLedger {
    slots: Vec<SuggestionSlot>,
}

impl SuggestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `[start, end)` overlaps a slot already reserved.
    pub fn collides(&self, start: DateTime<Tz>, end: DateTime<Tz>) -> bool {
        self.slots
            .iter()
            .any(|slot| overlaps(slot.start, slot.end, start, end))
    }

    /// Reserve `slot`, refusing it if it overlaps an existing reservation
    /// or has a non-positive duration.
    pub fn reserve(&mut self, slot: SuggestionSlot) -> Result<()> {
        if slot.start >= slot.end {
            return Err(EngineError::InvalidDuration(format!(
                "slot for '{}' has non-positive duration",
                slot.event.title
            )));
        }
        if self.collides(slot.start, slot.end) {
            return Err(EngineError::LedgerCollision(format!(
                "slot {} – {} for '{}' overlaps an earlier suggestion",
                slot.start, slot.end, slot.event.title
            )));
        }
        self.slots.push(slot);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SuggestionSlot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
