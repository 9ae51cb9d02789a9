//! Candidate slot generation.
//!
//! The search space for a displaced event is walked in strict priority
//! order: day first (target day, then each following calendar day up to the
//! horizon), then start time within the business window, earliest first.
//! [`CandidateSlots`] yields candidates in exactly that order so the search
//! engine can simply take the first one that passes its acceptance checks.
//!
//! Weekend days count toward the horizon but never yield candidates: a
//! 14-day horizon covers 14 calendar days, i.e. ten weekdays.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::temporal::{is_weekend, local_instant};

/// What to do with a day for which some calendar's busy data is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownBusyPolicy {
    /// Offer no candidates on that day.
    #[default]
    Exclude,
    /// Treat the unknown calendar as free. Suggestions may land on time the
    /// calendar's owner is actually busy.
    AssumeFree,
}

/// Tunables for the slot search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Number of calendar days searched, starting at the target day.
    pub horizon_days: u32,
    /// Earliest start time of a suggested slot.
    pub day_start: NaiveTime,
    /// A suggested slot must end at or before this time.
    pub day_end: NaiveTime,
    /// Spacing between candidate start times.
    pub step_minutes: u32,
    /// Never suggest Saturdays or Sundays.
    pub skip_weekends: bool,
    pub unknown_busy: UnknownBusyPolicy,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            horizon_days: 14,
            day_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            day_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default(),
            step_minutes: 30,
            skip_weekends: true,
            unknown_busy: UnknownBusyPolicy::Exclude,
        }
    }
}

impl SearchOptions {
    /// Reject option sets that would make the search space empty or endless.
    pub fn validate(&self) -> Result<()> {
        if self.horizon_days == 0 {
            return Err(EngineError::InvalidConfig(
                "horizon_days must be at least 1".to_string(),
            ));
        }
        if self.step_minutes == 0 {
            return Err(EngineError::InvalidConfig(
                "step_minutes must be at least 1".to_string(),
            ));
        }
        if self.day_start >= self.day_end {
            return Err(EngineError::InvalidConfig(format!(
                "business window is empty: {} >= {}",
                self.day_start, self.day_end
            )));
        }
        Ok(())
    }

    /// Candidate start times within one day, earliest first.
    pub fn start_times(&self) -> Vec<NaiveTime> {
        let step = Duration::minutes(i64::from(self.step_minutes.max(1)));
        let mut times = Vec::new();
        let mut t = self.day_start;
        while t < self.day_end {
            times.push(t);
            let (next, wrapped) = t.overflowing_add_signed(step);
            if wrapped != 0 || next <= t {
                break;
            }
            t = next;
        }
        times
    }

    /// All candidates from `first_day` onward, in priority order.
    pub fn candidates(&self, tz: Tz, first_day: NaiveDate) -> CandidateSlots {
        CandidateSlots {
            tz,
            first_day,
            horizon_days: self.horizon_days,
            skip_weekends: self.skip_weekends,
            day_end: self.day_end,
            times: self.start_times(),
            day_offset: 0,
            time_index: 0,
        }
    }
}

/// One candidate start on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub day: NaiveDate,
    pub start: DateTime<Tz>,
    /// Close of business on `day`; a slot must end at or before it.
    pub close: DateTime<Tz>,
}

/// Iterator over candidate slots in day → time priority order.
#[derive(Debug, Clone)]
pub struct CandidateSlots {
    tz: Tz,
    first_day: NaiveDate,
    horizon_days: u32,
    skip_weekends: bool,
    day_end: NaiveTime,
    times: Vec<NaiveTime>,
    day_offset: u32,
    time_index: usize,
}

impl CandidateSlots {
    fn advance_day(&mut self) {
        self.day_offset += 1;
        self.time_index = 0;
    }
}

impl Iterator for CandidateSlots {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while self.day_offset < self.horizon_days {
            let Some(day) = self
                .first_day
                .checked_add_signed(Duration::days(i64::from(self.day_offset)))
            else {
                return None;
            };

            if (self.skip_weekends && is_weekend(day)) || self.time_index >= self.times.len() {
                self.advance_day();
                continue;
            }

            let Some(close) = local_instant(&self.tz, day, self.day_end) else {
                self.advance_day();
                continue;
            };

            let time = self.times[self.time_index];
            self.time_index += 1;

            // Nonexistent local time (DST gap): skip just this start.
            let Some(start) = local_instant(&self.tz, day, time) else {
                continue;
            };

            return Some(Candidate { day, start, close });
        }
        None
    }
}
