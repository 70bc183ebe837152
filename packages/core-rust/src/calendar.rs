//! Calendar comparisons used by streak windows.
//!
//! Both sides of every comparison are converted into the same reference
//! offset before their fields are read, so "same day" never mixes zones.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};

/// Length of a streak window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakWindow {
    Daily,
    Weekly,
}

impl StreakWindow {
    /// Counter key TTL in seconds for this window.
    #[must_use]
    pub const fn ttl_secs(self) -> u64 {
        match self {
            Self::Daily => 86_400,
            Self::Weekly => 604_800,
        }
    }
}

/// Converts a Unix timestamp (seconds) into the reference offset.
///
/// Returns `None` for timestamps outside chrono's representable range.
#[must_use]
pub fn from_unix(secs: i64, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    tz.timestamp_opt(secs, 0).single()
}

/// Whether two instants share year, month, and day-of-month in `tz`.
#[must_use]
pub fn same_calendar_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: FixedOffset) -> bool {
    a.with_timezone(&tz).date_naive() == b.with_timezone(&tz).date_naive()
}

/// Whether two instants fall in the same ISO 8601 week (Monday start,
/// ISO week-numbering year) in `tz`.
#[must_use]
pub fn same_iso_week(a: DateTime<Utc>, b: DateTime<Utc>, tz: FixedOffset) -> bool {
    let a = a.with_timezone(&tz).iso_week();
    let b = b.with_timezone(&tz).iso_week();
    a.year() == b.year() && a.week() == b.week()
}

/// Whether `earlier` falls on the calendar day right before `later` in `tz`.
#[must_use]
pub fn is_previous_day(earlier: DateTime<Utc>, later: DateTime<Utc>, tz: FixedOffset) -> bool {
    earlier
        .with_timezone(&tz)
        .date_naive()
        .succ_opt()
        .is_some_and(|next| next == later.with_timezone(&tz).date_naive())
}
