//! Detect overlapping events in a day's schedule.
//!
//! Works on the start-sorted event sequence produced by
//! [`normalize_all`](crate::event::normalize_all) and reports every pair of
//! events whose time ranges strictly overlap. Adjacent events (where one
//! ends exactly when another starts) are NOT conflicts.

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::event::CalendarEvent;

/// A detected conflict between two events of a sorted sequence.
///
/// `first` and `second` are positions in that sequence, `first < second`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub first: usize,
    pub second: usize,
    pub overlap_minutes: i64,
}

/// Whether `[a_start, a_end)` and `[b_start, b_end)` strictly overlap.
///
/// Two intervals overlap iff `max(starts) < min(ends)`. This excludes the
/// adjacent case where one ends exactly when the other starts.
pub fn overlaps<A: TimeZone, B: TimeZone>(
    a_start: DateTime<A>,
    a_end: DateTime<A>,
    b_start: DateTime<B>,
    b_end: DateTime<B>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// Find all pairwise conflicts in a start-sorted event sequence.
///
/// Conflicts are ordered by the position of their first event, then of
/// their second. Because the input is sorted by start, the scan for event
/// `i` stops at the first later event that starts at or after `i` ends, so
/// the cost is O(n + k) for k conflicts on top of the sort.
pub fn find_conflicts(events: &[CalendarEvent]) -> Vec<Conflict> {
    debug_assert!(
        events.windows(2).all(|w| w[0].start <= w[1].start),
        "events must be sorted by start"
    );

    let mut conflicts = Vec::new();

    for (i, a) in events.iter().enumerate() {
        for (j, b) in events.iter().enumerate().skip(i + 1) {
            if b.start >= a.end {
                break;
            }
            if overlaps(a.start, a.end, b.start, b.end) {
                let overlap_start = a.start.max(b.start);
                let overlap_end = a.end.min(b.end);

                conflicts.push(Conflict {
                    first: i,
                    second: j,
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CalendarId;
    use chrono::{NaiveDate, NaiveTime};
    use chrono_tz::Tz;

    fn event(id: &str, start: (u32, u32), end: (u32, u32)) -> CalendarEvent {
        let tz: Tz = chrono_tz::America::Chicago;
        let date = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        let at = |(h, m): (u32, u32)| {
            crate::temporal::local_instant(&tz, date, NaiveTime::from_hms_opt(h, m, 0).unwrap())
                .unwrap()
        };
        CalendarEvent {
            id: id.to_string(),
            calendar: CalendarId::new("a@example.com"),
            creator: "a@example.com".to_string(),
            start: at(start),
            end: at(end),
            title: id.to_string(),
            link: "#".to_string(),
        }
    }

    #[test]
    fn test_partial_overlap_is_one_conflict() {
        let events = vec![event("E1", (9, 0), (10, 0)), event("E2", (9, 30), (10, 30))];
        let conflicts = find_conflicts(&events);
        assert_eq!(
            conflicts,
            vec![Conflict {
                first: 0,
                second: 1,
                overlap_minutes: 30
            }]
        );
    }

    #[test]
    fn test_adjacent_events_do_not_conflict() {
        let events = vec![event("E1", (9, 0), (10, 0)), event("E2", (10, 0), (11, 0))];
        assert!(find_conflicts(&events).is_empty());
    }

    #[test]
    fn test_containment_is_a_conflict() {
        let events = vec![event("outer", (9, 0), (12, 0)), event("inner", (10, 0), (10, 30))];
        let conflicts = find_conflicts(&events);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].overlap_minutes, 30);
    }

    #[test]
    fn test_order_is_first_then_second() {
        let events = vec![
            event("long", (9, 0), (12, 0)),
            event("a", (9, 30), (10, 30)),
            event("b", (10, 0), (11, 0)),
            event("c", (13, 0), (14, 0)),
        ];
        let pairs: Vec<(usize, usize)> = find_conflicts(&events)
            .iter()
            .map(|c| (c.first, c.second))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_scan_continues_past_short_non_overlapping_neighbour() {
        // "short" ends before "late" starts but "long" still overlaps "late".
        let events = vec![
            event("long", (9, 0), (12, 0)),
            event("short", (9, 0), (9, 30)),
            event("late", (11, 0), (11, 30)),
        ];
        let pairs: Vec<(usize, usize)> = find_conflicts(&events)
            .iter()
            .map(|c| (c.first, c.second))
            .collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn test_idempotent() {
        let events = vec![
            event("a", (9, 0), (10, 0)),
            event("b", (9, 15), (9, 45)),
            event("c", (9, 30), (11, 0)),
        ];
        assert_eq!(find_conflicts(&events), find_conflicts(&events));
    }

    #[test]
    fn test_empty_and_single() {
        assert!(find_conflicts(&[]).is_empty());
        assert!(find_conflicts(&[event("solo", (9, 0), (10, 0))]).is_empty());
    }
}
