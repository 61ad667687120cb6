//! Quota Period
//!
//! The quota period is the current calendar month. By default the month
//! starts at local midnight on the server; no per-user timezone is applied.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Timezone used to find the first instant of the month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthBoundary {
    /// Server-local time
    #[default]
    Local,
    /// UTC
    Utc,
}

/// First instant of the calendar month containing `now`
pub fn month_start(now: DateTime<Utc>, boundary: MonthBoundary) -> DateTime<Utc> {
    match boundary {
        MonthBoundary::Utc => {
            let midnight = first_midnight(now.year(), now.month());
            Utc.from_utc_datetime(&midnight)
        }
        MonthBoundary::Local => {
            let local = now.with_timezone(&Local);
            let midnight = first_midnight(local.year(), local.month());
            match Local.from_local_datetime(&midnight).earliest() {
                Some(start) => start.with_timezone(&Utc),
                // Midnight skipped by a DST jump; fall back to the naive instant
                None => Utc.from_utc_datetime(&midnight),
            }
        }
    }
}

fn first_midnight(year: i32, month: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or(NaiveDate::MIN)
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
}
