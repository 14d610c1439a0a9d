//! Daily check cadence anchored to 03:00 at UTC+09:00.
//!
//! Installs spread their first check to the next anchor instead of calling
//! the provider on process start. Ticks arrive hourly; each one re-derives
//! whether the anchor has passed.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};

/// Hour of day of the daily anchor, in the reference zone.
pub const ANCHOR_HOUR: i64 = 3;

/// Offset of the reference zone from UTC, in seconds.
pub const ANCHOR_UTC_OFFSET_SECS: i64 = 9 * 60 * 60;

/// The anchor on the day after `now`'s reference-zone date.
pub fn first_check_after(now: DateTime<Utc>) -> DateTime<Utc> {
    let offset = Duration::seconds(ANCHOR_UTC_OFFSET_SECS);
    let local_midnight = (now.naive_utc() + offset).date().and_time(NaiveTime::MIN);
    let anchor_local = local_midnight + Duration::days(1) + Duration::hours(ANCHOR_HOUR);
    Utc.from_utc_datetime(&(anchor_local - offset))
}

/// Whether a check due at `due` should run at `now`.
pub fn is_due(due: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= due
}

/// The first daily occurrence of `due` strictly after `now`.
///
/// Missed days collapse into a single run.
pub fn next_after(due: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if due > now {
        return due;
    }
    let days = (now - due).num_days() + 1;
    let mut next = due + Duration::days(days);
    while next <= now {
        next += Duration::days(1);
    }
    next
}
