//! Conversions for Windows FILETIME values.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, Utc};

// NaiveDate/Time construction can panic if given invalid values, but 1601-01-01 00:00:00 is valid.
const WINDOWS_EPOCH_NAIVE: NaiveDateTime = match NaiveDate::from_ymd_opt(1601, 1, 1) {
    Some(date) => match date.and_hms_opt(0, 0, 0) {
        Some(datetime) => datetime,
        None => panic!("Invalid time component for Windows epoch constant"),
    },
    None => panic!("Invalid date component for Windows epoch constant"),
};
const WINDOWS_EPOCH_UTC: DateTime<Utc> =
    DateTime::<Utc>::from_naive_utc_and_offset(WINDOWS_EPOCH_NAIVE, Utc);

/// Number of 100-nanosecond ticks per second.
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// Seconds between 1601-01-01 and 1970-01-01.
pub const EPOCH_DIFFERENCE_SECS: i64 = 11_644_473_600;

/// Converts a Windows FILETIME (100-nanosecond intervals since 1601-01-01 UTC)
/// to a UTC calendar time.
///
/// Every `u64` maps to a valid time: the largest FILETIME lands in the year
/// 60056, well inside chrono's range.
pub fn filetime_to_utc(filetime: u64) -> DateTime<Utc> {
    let secs_since_windows_epoch = filetime / TICKS_PER_SECOND;
    let nanos_remainder = (filetime % TICKS_PER_SECOND) * 100;

    // secs fits an i64 (u64::MAX / 10^7 < 2^41).
    let duration_since_windows_epoch = ChronoDuration::seconds(secs_since_windows_epoch as i64)
        + ChronoDuration::nanoseconds(nanos_remainder as i64);

    WINDOWS_EPOCH_UTC
        .checked_add_signed(duration_since_windows_epoch)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Converts a Windows FILETIME to whole POSIX seconds.
///
/// Sub-second ticks are dropped before the epoch shift, so times before 1970
/// come out as the FILETIME's whole seconds minus the epoch difference.
pub fn filetime_to_epoch_seconds(filetime: u64) -> i64 {
    (filetime / TICKS_PER_SECOND) as i64 - EPOCH_DIFFERENCE_SECS
}
