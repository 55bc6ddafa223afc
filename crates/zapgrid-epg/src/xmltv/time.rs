//! XMLTV timestamp and date formatting.

use chrono::{DateTime, NaiveDate, TimeZone};

/// Formats `ms` as `YYYYmmddHHMMSS +HHMM` on the clock of `tz`.
///
/// The wall-clock part is shifted by `shift_minutes`; the offset suffix
/// is taken from the unshifted instant.
#[must_use]
pub fn format_xmltv_time<Tz: TimeZone>(ms: i64, shift_minutes: i64, tz: &Tz) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let shifted_ms = ms.checked_add(shift_minutes.checked_mul(60_000)?)?;
    let wall = tz.timestamp_millis_opt(shifted_ms).single()?;
    let instant = tz.timestamp_millis_opt(ms).single()?;
    Some(format!(
        "{} {}",
        wall.format("%Y%m%d%H%M%S"),
        instant.format("%z")
    ))
}

/// Renders a digits-only original air date as `YYYYmmdd`.
///
/// The first eight digits are used when they form a calendar date;
/// otherwise the digits are read as epoch milliseconds (UTC).
#[must_use]
pub fn format_air_date(digits: &str) -> Option<String> {
    if let Some(prefix) = digits.get(..8)
        && NaiveDate::parse_from_str(prefix, "%Y%m%d").is_ok()
    {
        return Some(String::from(prefix));
    }
    let ms: i64 = digits.parse().ok()?;
    DateTime::from_timestamp_millis(ms).map(|dt| dt.format("%Y%m%d").to_string())
}
