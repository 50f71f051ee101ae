use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

/// Parses a due date like "tomorrow 9am" relative to now in `tz`.
pub fn parse_due_date(date_str: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let now = Utc::now().with_timezone(&tz);
    parse_date_string(date_str, now, Dialect::Us)
        .map(|local| local.with_timezone(&Utc))
        .map_err(|e| anyhow!("Failed to parse due date '{}': {}", date_str, e))
}

/// Parses a calendar date, either ISO (`2025-12-31`) or relative ("next friday").
pub fn parse_calendar_date(date_str: &str, tz: Tz) -> Result<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d") {
        return Ok(date);
    }
    let now = Utc::now().with_timezone(&tz);
    parse_date_string(date_str, now, Dialect::Us)
        .map(|local| local.date_naive())
        .map_err(|e| anyhow!("Failed to parse date '{}': {}", date_str, e))
}
