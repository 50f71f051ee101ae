use crate::error::CoreError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;

/// Validate and parse an IANA timezone name
pub fn validate_timezone(timezone: &str) -> Result<Tz, CoreError> {
    Tz::from_str(timezone)
        .map_err(|_| CoreError::Validation(format!("Invalid timezone: {}", timezone)))
}

/// Calendar date of `instant` as seen in `tz`
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Wall-clock time of `instant` as seen in `tz`
pub fn local_time(instant: DateTime<Utc>, tz: Tz) -> NaiveTime {
    instant.with_timezone(&tz).time()
}

/// Resolve a local date and wall-clock time to a UTC instant.
///
/// Ambiguous times (DST fall-back) take the earlier instant. Times that do
/// not exist (DST spring-forward) move forward one hour.
pub fn at_local_time(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(time);
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return local.with_timezone(&Utc);
    }

    let shifted = naive + Duration::hours(1);
    match tz.from_local_datetime(&shifted).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // No zone has a gap longer than an hour at the same spot; treat as UTC.
        None => Utc.from_utc_datetime(&naive),
    }
}

/// Format datetime with timezone-aware display
pub fn format_with_timezone(datetime: DateTime<Utc>, tz: Tz, format: &str) -> String {
    datetime.with_timezone(&tz).format(format).to_string()
}
