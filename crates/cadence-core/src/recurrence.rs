//! Occurrence calculation for recurring tasks.
//!
//! Everything in here is pure date arithmetic over [`NaiveDate`]: no clock,
//! no storage. The repository decides *which* date to advance from and what
//! to do with the answer.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::error::CoreError;
use crate::models::{Frequency, PatternSpec, WeekdaySet};

/// Computes the first occurrence strictly after `reference`.
///
/// # Behavior
/// - `daily`: `reference + interval` days
/// - `weekly` without weekdays: `reference + 7 * interval` days
/// - `weekly` with weekdays: the rest of the reference's week (Monday-first)
///   is searched first; failing that, the week `interval` weeks later
/// - `monthly`: `interval` months ahead, on `day_of_month` (or the reference's
///   own day) clamped to the length of the target month
///
/// Returns `None` once the result would fall after `end_date`.
pub fn next_occurrence(reference: NaiveDate, spec: &PatternSpec) -> Option<NaiveDate> {
    let interval = spec.interval.max(1);

    let candidate = match spec.frequency {
        Frequency::Daily => reference.checked_add_days(Days::new(u64::from(interval))),
        Frequency::Weekly if spec.weekdays.is_empty() => {
            reference.checked_add_days(Days::new(7 * u64::from(interval)))
        }
        Frequency::Weekly => next_weekday_in_blocks(reference, spec.weekdays, interval),
        Frequency::Monthly => {
            let day = spec.day_of_month.unwrap_or_else(|| reference.day());
            next_month_day(reference, day, interval)
        }
    }?;

    match spec.end_date {
        Some(end) if candidate > end => None,
        _ => Some(candidate),
    }
}

fn next_weekday_in_blocks(reference: NaiveDate, days: WeekdaySet, interval: u32) -> Option<NaiveDate> {
    let offset = reference.weekday().num_days_from_monday();
    let week_start = reference.checked_sub_days(Days::new(u64::from(offset)))?;

    // Remainder of the current block's first week.
    for ahead in 1..(7 - offset) {
        let date = reference.checked_add_days(Days::new(u64::from(ahead)))?;
        if days.contains(date.weekday()) {
            return Some(date);
        }
    }

    let next_block = week_start.checked_add_days(Days::new(7 * u64::from(interval)))?;
    let first = days.iter().next()?;
    next_block.checked_add_days(Days::new(u64::from(first.num_days_from_monday())))
}

fn next_month_day(reference: NaiveDate, day: u32, interval: u32) -> Option<NaiveDate> {
    let first_of_month = reference.with_day(1)?;
    let target = first_of_month.checked_add_months(Months::new(interval))?;
    let day = day.clamp(1, days_in_month(target.year(), target.month()));
    target.with_day(day)
}

/// Number of days in the given month, leap years included.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Iterator over successive occurrences, each one advanced from the last.
#[derive(Debug, Clone)]
pub struct Occurrences<'a> {
    spec: &'a PatternSpec,
    cursor: Option<NaiveDate>,
}

impl<'a> Occurrences<'a> {
    pub fn new(spec: &'a PatternSpec, from: NaiveDate) -> Self {
        Self {
            spec,
            cursor: Some(from),
        }
    }
}

impl Iterator for Occurrences<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let next = next_occurrence(self.cursor?, self.spec);
        self.cursor = next;
        next
    }
}

/// Largest `count` [`preview_occurrences`] accepts.
pub const MAX_PREVIEW_COUNT: usize = 1000;

/// Preview the next `count` occurrences after `from`.
///
/// Validates the pattern and `count` (at most [`MAX_PREVIEW_COUNT`]) first.
/// The result is shorter than `count` only when the pattern reaches its end date.
pub fn preview_occurrences(
    spec: &PatternSpec,
    from: NaiveDate,
    count: usize,
) -> Result<Vec<NaiveDate>, CoreError> {
    spec.validate()?;
    if count > MAX_PREVIEW_COUNT {
        return Err(CoreError::Validation(format!(
            "cannot preview more than {} occurrences, got {}",
            MAX_PREVIEW_COUNT, count
        )));
    }
    Ok(Occurrences::new(spec, from).take(count).collect())
}
