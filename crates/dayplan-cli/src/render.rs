//! Plain-text rendering of a [`DailyReport`].

use std::fmt::Write;

use chrono::Duration;

use dayplan_engine::report::{DailyReport, SuggestionOutcome};
use dayplan_engine::search::ProviderOperation;
use dayplan_engine::temporal::{format_clock, format_day, format_duration, format_long_date};

pub fn render_text(report: &DailyReport, horizon_days: u32) -> String {
    let mut out = String::new();
    let heading = format_long_date(report.date);

    if report.is_free_day() {
        let _ = writeln!(out, "{heading}: no events scheduled");
        let _ = writeln!(out);
        let _ = writeln!(out, "Yay, it's a free day! No meetings, no stress.");
        render_warnings(&mut out, report);
        return out;
    }

    let _ = writeln!(out, "{heading} schedule ({})", report.timezone);
    let _ = writeln!(out);
    for event in &report.events {
        let _ = writeln!(
            out,
            "{} – {}  {}  ({})",
            format_clock(&event.start),
            format_clock(&event.end),
            event.title,
            event.creator
        );
    }

    if !report.conflicts.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Conflicts detected");
        for (index, conflict) in report.conflicts.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {} <-> {}",
                conflict.first.title, conflict.second.title
            );
            let _ = writeln!(
                out,
                "    {}–{} <-> {}–{}",
                format_clock(&conflict.first.start),
                format_clock(&conflict.first.end),
                format_clock(&conflict.second.start),
                format_clock(&conflict.second.end)
            );

            let Some(entry) = report.suggestion_for(index) else {
                continue;
            };
            match &entry.outcome {
                SuggestionOutcome::Proposed {
                    start,
                    end,
                    edit_link,
                } => {
                    let _ = writeln!(
                        out,
                        "    Suggest moving '{}' to {} at {}–{}  {}",
                        entry.event.title,
                        format_day(start),
                        format_clock(start),
                        format_clock(end),
                        edit_link
                    );
                }
                SuggestionOutcome::NoSlot { duration_seconds } => {
                    let _ = writeln!(
                        out,
                        "    No free slots found in the next {} for '{}' ({})",
                        horizon_phrase(horizon_days),
                        entry.event.title,
                        format_duration(Duration::seconds(*duration_seconds))
                    );
                }
                SuggestionOutcome::Skipped { reason } => {
                    let _ = writeln!(
                        out,
                        "    Could not search a slot for '{}': {}",
                        entry.event.title, reason
                    );
                }
            }
        }
    }

    render_warnings(&mut out, report);
    out
}

fn render_warnings(out: &mut String, report: &DailyReport) {
    if report.warnings.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Warnings");
    for warning in &report.warnings {
        let what = match warning.operation {
            ProviderOperation::ListEvents => "events",
            ProviderOperation::FreeBusy => "free/busy",
        };
        let calendar = warning
            .calendar
            .as_ref()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "all calendars".to_string());
        let _ = writeln!(
            out,
            "  {what} unavailable for {calendar} on {}: {}",
            warning.day, warning.error
        );
    }
}

fn horizon_phrase(days: u32) -> String {
    match days {
        1 => "day".to_string(),
        7 => "week".to_string(),
        d if d % 7 == 0 => format!("{} weeks", d / 7),
        d => format!("{d} days"),
    }
}
