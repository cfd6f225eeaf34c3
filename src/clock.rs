//! Time helpers
//!
//! Every timestamp the application stores is an RFC 3339 string in India
//! Standard Time, so string order in SQLite matches chronological order.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone};
use chrono_tz::Asia::Kolkata;
use chrono_tz::Tz;

/// Current time in IST
pub fn now_ist() -> DateTime<Tz> {
    chrono::Utc::now().with_timezone(&Kolkata)
}

/// Current time in IST as an RFC 3339 string
pub fn now_rfc3339() -> String {
    to_rfc3339(&now_ist())
}

/// Format an IST timestamp for storage
pub fn to_rfc3339(ts: &DateTime<Tz>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
}

/// Midnight of the current IST day, formatted for storage
pub fn start_of_today_rfc3339() -> String {
    let today = now_ist().date_naive();
    start_of_day(today)
        .map(|ts| to_rfc3339(&ts))
        .unwrap_or_else(|| format!("{}T00:00:00+05:30", today.format("%Y-%m-%d")))
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Kolkata.from_local_datetime(&midnight).single()
}

/// IST timestamp `n` days before now, formatted for storage
pub fn days_ago_rfc3339(n: i64) -> String {
    to_rfc3339(&(now_ist() - ChronoDuration::days(n)))
}

/// Parse a stored timestamp back into IST.
///
/// Timestamps without an offset are treated as IST.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Tz>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Kolkata));
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .and_then(|naive| Kolkata.from_local_datetime(&naive).single())
}

/// Extract the `YYYY-MM-DD` part of a stored timestamp
pub fn date_label(value: &str) -> String {
    parse_timestamp(value)
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| value.chars().take(10).collect())
}

/// Whole days elapsed since a stored timestamp
pub fn days_since(value: &str) -> Option<i64> {
    parse_timestamp(value).map(|ts| (now_ist() - ts).num_days())
}
