//! Relative date resolution and stale-date correction.
//!
//! Analytics questions are almost always phrased relative to "now"
//! ("yesterday", "last 30 days"), while models asked to produce literal
//! `YYYY-MM-DD` arguments tend to echo dates from their training data.
//! [`resolve_relative`] turns phrases into absolute ranges and [`sanitize`]
//! replaces model-supplied dates that are implausibly old.
//!
//! Everything here is pure: the reference date is always passed in.

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Wire format for dates in tool arguments.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Window used when a phrase is not recognized.
pub const DEFAULT_WINDOW_DAYS: u64 = 7;

/// An inclusive `[start, end]` date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A range covering one day.
    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    /// The `days` complete days before `reference`, ending yesterday.
    ///
    /// Falls back to the default window if `days` is zero or the
    /// arithmetic leaves chrono's representable range.
    pub fn last_complete_days(days: u64, reference: NaiveDate) -> Self {
        let days = if days == 0 { DEFAULT_WINDOW_DAYS } else { days };
        let end = days_before(reference, 1);
        let start = reference
            .checked_sub_days(Days::new(days))
            .unwrap_or_else(|| days_before(reference, DEFAULT_WINDOW_DAYS));
        Self::new(start, end)
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start_str(), self.end_str())
    }
}

fn days_before(reference: NaiveDate, days: u64) -> NaiveDate {
    reference
        .checked_sub_days(Days::new(days))
        .unwrap_or(NaiveDate::MIN)
}

/// Parse a `YYYY-MM-DD` date, tolerating surrounding whitespace.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

/// Resolve a relative date phrase against `reference`.
///
/// Matching is case-insensitive and by substring, in this order:
///
/// | phrase                      | range                            |
/// |-----------------------------|----------------------------------|
/// | `today`                     | reference .. reference           |
/// | `yesterday`                 | reference-1 .. reference-1       |
/// | `last week` / `past week`   | 7 complete days ending yesterday  |
/// | `last month` / `past month` | 30 complete days ending yesterday |
/// | `last N days` / `past N days` | N complete days ending yesterday |
/// | anything else               | 7 complete days ending yesterday  |
pub fn resolve_relative(phrase: &str, reference: NaiveDate) -> DateRange {
    let phrase = phrase.to_lowercase();

    if phrase.contains("today") {
        return DateRange::single(reference);
    }
    if phrase.contains("yesterday") {
        return DateRange::single(days_before(reference, 1));
    }
    if phrase.contains("last week") || phrase.contains("past week") {
        return DateRange::last_complete_days(7, reference);
    }
    if phrase.contains("last month") || phrase.contains("past month") {
        return DateRange::last_complete_days(30, reference);
    }
    if let Some(days) = last_n_days(&phrase) {
        return DateRange::last_complete_days(days, reference);
    }
    DateRange::last_complete_days(DEFAULT_WINDOW_DAYS, reference)
}

/// Extract `N` from "last N days" / "past N days" (lowercased input).
fn last_n_days(phrase: &str) -> Option<u64> {
    ["last ", "past "].iter().find_map(|prefix| {
        phrase.match_indices(prefix).find_map(|(idx, _)| {
            let rest = phrase.get(idx + prefix.len()..)?;
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            let after = rest.get(digits.len()..)?.trim_start();
            if digits.is_empty() || !after.starts_with("day") {
                return None;
            }
            digits.parse().ok().filter(|n| *n > 0)
        })
    })
}

/// Whether `date` lies before the calendar year preceding `reference`.
pub fn is_stale(date: NaiveDate, reference: NaiveDate) -> bool {
    date.year() < reference.year() - 1
}

/// Correct model-supplied dates that are implausibly old.
///
/// If either date falls before the previous calendar year, the pair is
/// discarded: a single-day request becomes "yesterday", anything else the
/// last 7 complete days. Current- and prior-year dates pass through
/// unchanged.
pub fn sanitize(start: NaiveDate, end: NaiveDate, reference: NaiveDate) -> DateRange {
    if !is_stale(start, reference) && !is_stale(end, reference) {
        return DateRange::new(start, end);
    }
    if DateRange::new(start, end).is_single_day() {
        DateRange::single(days_before(reference, 1))
    } else {
        DateRange::last_complete_days(DEFAULT_WINDOW_DAYS, reference)
    }
}
