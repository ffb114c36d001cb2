//! Inclusive calendar-date range used to select scan events for a report.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Date format accepted for range bounds.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed {bound} date {value:?}: expected YYYY-MM-DD")]
    MalformedDate { bound: &'static str, value: String },
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

/// Closed `[start, end]` date interval; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DateRange {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl DateRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, RangeError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(RangeError::Inverted { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// Unbounded range selecting every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// From the first day of `today`'s month through `today`.
    pub fn current_month(today: NaiveDate) -> Self {
        Self {
            start: today.with_day(1),
            end: Some(today),
        }
    }

    /// Parse optional `YYYY-MM-DD` bounds. Blank input counts as an omitted bound.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, RangeError> {
        let start = parse_bound("start", start)?;
        let end = parse_bound("end", end)?;
        Self::new(start, end)
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    /// Whether `date` falls inside the range. Both bounds are inclusive.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.start, self.end) {
            (Some(s), Some(e)) => write!(f, "{s} .. {e}"),
            (Some(s), None) => write!(f, "{s} .."),
            (None, Some(e)) => write!(f, ".. {e}"),
            (None, None) => write!(f, "all dates"),
        }
    }
}

fn parse_bound(bound: &'static str, value: Option<&str>) -> Result<Option<NaiveDate>, RangeError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Some)
            .map_err(|_| RangeError::MalformedDate {
                bound,
                value: s.to_string(),
            }),
    }
}
