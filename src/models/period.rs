//! Snapshot period tokens.
//!
//! Periods are calendar months written as `YYYY-MM`, which sort lexicographically in
//! chronological order.

use chrono::{Datelike, Months, NaiveDate};
use thiserror::Error;

/// Earliest period the auto mode looks at when no start is given.
pub const DEFAULT_START_PERIOD: &str = "2025-01";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Invalid period (expected YYYY-MM): {0}")]
    Invalid(String),

    #[error("Period range is reversed: {start} > {end}")]
    Reversed { start: String, end: String },
}

/// Parse a `YYYY-MM` token into the first day of that month.
pub fn parse_period(s: &str) -> Result<NaiveDate, PeriodError> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| PeriodError::Invalid(s.to_string()))
}

/// Format a date as its period token.
pub fn format_period(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}

/// Year component of a period token.
pub fn period_year(s: &str) -> Result<i32, PeriodError> {
    parse_period(s).map(|d| d.year())
}

/// All periods from `start` to `end`, both inclusive.
pub fn period_range(start: &str, end: &str) -> Result<Vec<String>, PeriodError> {
    let mut current = parse_period(start)?;
    let stop = parse_period(end)?;
    if current > stop {
        return Err(PeriodError::Reversed {
            start: start.to_string(),
            end: end.to_string(),
        });
    }

    let mut out = Vec::new();
    while current <= stop {
        out.push(format_period(current));
        current = match current.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(out)
}

/// The last fully completed month relative to `today`.
pub fn last_full_period(today: NaiveDate) -> String {
    let first_of_month = today.with_day(1).unwrap_or(today);
    let previous = first_of_month
        .checked_sub_months(Months::new(1))
        .unwrap_or(first_of_month);
    format_period(previous)
}
