use chrono::{Local, NaiveDate, TimeZone, Utc};

use crate::error::{Error, Result};

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// UTC half-open range `[start, end)` covering the current local calendar
/// day. Stored timestamps are RFC 3339 UTC, so range checks compare
/// lexicographically.
pub fn local_day_utc_bounds() -> Result<(String, String)> {
    let today = Local::now().date_naive();
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| Error::InvalidOperation("calendar range exceeded".into()))?;
    Ok((local_midnight_utc(today)?, local_midnight_utc(tomorrow)?))
}

fn local_midnight_utc(day: NaiveDate) -> Result<String> {
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::InvalidOperation("invalid date".into()))?;
    let local = Local
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| Error::InvalidOperation("unmappable local midnight".into()))?;
    Ok(local.with_timezone(&Utc).to_rfc3339())
}

/// `YYYY-MM` key used to group invoices by creation month.
pub fn month_key(year: i32, month: u32) -> String {
    format!("{}-{:02}", year, month)
}

pub fn normalize_date(value: Option<String>) -> Option<String> {
    let raw = value?.trim().to_string();
    if raw.is_empty() {
        return None;
    }

    let formats = ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d", "%Y.%m.%d"];
    for fmt in formats.iter() {
        if let Ok(date) = NaiveDate::parse_from_str(&raw, fmt) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    Some(raw)
}
