//! Streak window laws for the weekly check-in and the daily like reward.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, FixedOffset, Offset, TimeZone, Utc};
use pawprint_server::storage::engines::MemoryCounterStore;
use pawprint_server::storage::CounterStore;
use pawprint_server::streak::{ManualClock, StreakTracker, CHECK_IN_FEATURE, LIKE_FEATURE};
use pawprint_server::{StoreError, StoreResult};
use proptest::prelude::*;

fn tracker_at(
    start: chrono::DateTime<Utc>,
    tz: FixedOffset,
) -> (StreakTracker, Arc<ManualClock>, Arc<MemoryCounterStore>) {
    let clock = Arc::new(ManualClock::new(start));
    let counters = Arc::new(MemoryCounterStore::new());
    let tracker = StreakTracker::new(Arc::clone(&counters) as _, Arc::clone(&clock) as _, tz);
    (tracker, clock, counters)
}

fn runtime() -> Result<tokio::runtime::Runtime, TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(format!("failed to build runtime: {e}")))
}

#[tokio::test]
async fn same_iso_week_counts_up_and_gap_resets() {
    // Monday of ISO week 19.
    let monday = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
    let (tracker, clock, _) = tracker_at(monday, Utc.fix());

    assert_eq!(tracker.check_in("u1").await.count, 1);
    clock.advance(chrono::Duration::days(2));
    let wednesday = tracker.check_in("u1").await;
    assert!(wednesday.granted);
    assert_eq!(wednesday.count, 2);

    clock.advance(chrono::Duration::days(9));
    let later = tracker.check_in("u1").await;
    assert!(later.granted);
    assert_eq!(later.count, 1);
}

#[tokio::test]
async fn monday_after_sunday_starts_a_new_week() {
    let sunday = Utc.with_ymd_and_hms(2024, 5, 12, 22, 0, 0).unwrap();
    let (tracker, clock, _) = tracker_at(sunday, Utc.fix());
    tracker.check_in("u1").await;
    tracker.check_in("u1").await;

    clock.advance(chrono::Duration::hours(4));
    let monday = tracker.check_in("u1").await;
    assert_eq!((monday.granted, monday.count), (true, 1));
}

#[tokio::test]
async fn iso_week_spans_the_new_year() {
    // Monday 2024-12-30 and Friday 2025-01-03 share ISO week 2025-W01.
    let start = Utc.with_ymd_and_hms(2024, 12, 30, 10, 0, 0).unwrap();
    let (tracker, clock, _) = tracker_at(start, Utc.fix());
    tracker.check_in("u1").await;

    clock.advance(chrono::Duration::days(4));
    assert_eq!(clock_now_year(&clock), 2025);
    let friday = tracker.check_in("u1").await;
    assert_eq!((friday.granted, friday.count), (true, 2));
}

fn clock_now_year(clock: &ManualClock) -> i32 {
    use pawprint_server::streak::Clock;
    clock.now().year()
}

#[tokio::test]
async fn calendar_day_follows_the_reference_offset() {
    // 15:30 and 16:30 UTC fall on different local days at UTC+8.
    let tz = FixedOffset::east_opt(8 * 3600).unwrap();
    let start = Utc.with_ymd_and_hms(2024, 5, 7, 15, 30, 0).unwrap();
    let (tracker, clock, _) = tracker_at(start, tz);
    tracker.check_in("u1").await;

    clock.advance(chrono::Duration::hours(1));
    let second = tracker.check_in("u1").await;
    assert!(second.granted, "different local days at UTC+8");

    clock.advance(chrono::Duration::hours(1));
    assert!(!tracker.check_in("u1").await.granted, "same local day");
}

#[tokio::test]
async fn counters_use_feature_keys_as_decimal_strings() {
    let start = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
    let (tracker, _, counters) = tracker_at(start, Utc.fix());
    tracker.check_in("u1").await;
    tracker.like_reward("u1", 3).await;

    let times_key = format!("{CHECK_IN_FEATURE}Timesu1");
    let dates_key = format!("{CHECK_IN_FEATURE}Datesu1");
    assert_eq!(counters.get(&times_key).await.unwrap().as_deref(), Some("1"));
    assert_eq!(
        counters.get(&dates_key).await.unwrap(),
        Some(start.timestamp().to_string())
    );
    assert_eq!(
        counters.get(&format!("{LIKE_FEATURE}Timesu1")).await.unwrap().as_deref(),
        Some("1")
    );
}

#[tokio::test]
async fn first_of_day_marks_once_per_day() {
    let start = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
    let (tracker, clock, _) = tracker_at(start, Utc.fix());
    assert!(tracker.first_of_day("post", "u1").await);
    assert!(!tracker.first_of_day("post", "u1").await);
    assert!(tracker.first_of_day("comment", "u1").await);

    clock.advance(chrono::Duration::days(1));
    assert!(tracker.first_of_day("post", "u1").await);
}

/// Reads succeed, every write fails.
struct ReadOnlyCounters(MemoryCounterStore);

#[async_trait]
impl CounterStore for ReadOnlyCounters {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.0.get(key).await
    }

    async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        Err(StoreError::backend(anyhow::anyhow!("read-only replica")))
    }
}

#[tokio::test]
async fn write_failure_is_fail_closed() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap(),
    ));
    let tracker = StreakTracker::new(
        Arc::new(ReadOnlyCounters(MemoryCounterStore::new())),
        clock,
        Utc.fix(),
    );
    let check_in = tracker.check_in("u1").await;
    assert!(!check_in.granted);
    let like = tracker.like_reward("u1", 3).await;
    assert!(!like.granted);
    assert!(!tracker.first_of_day("post", "u1").await);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A second check-in on the same calendar day is rejected and leaves the
    /// count unchanged.
    #[test]
    fn same_day_check_in_is_rejected(
        day in 0i64..365,
        first_minute in 0i64..720,
        gap_minutes in 0i64..720,
    ) {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::days(day);
        let first = midnight + chrono::Duration::minutes(first_minute);
        let rt = runtime()?;
        rt.block_on(async {
            let (tracker, clock, _) = tracker_at(first, Utc.fix());
            let a = tracker.check_in("u1").await;
            clock.advance(chrono::Duration::minutes(gap_minutes));
            let b = tracker.check_in("u1").await;
            prop_assert!(a.granted);
            prop_assert!(!b.granted);
            prop_assert_eq!(b.count, a.count);
            Ok(())
        })?;
    }

    /// Check-ins on consecutive days of one ISO week count up from 1.
    #[test]
    fn check_ins_within_a_week_count_up(week in 0i64..52, days in 1usize..=7) {
        // 2024-01-01 is a Monday.
        let monday = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
            + chrono::Duration::weeks(week);
        let rt = runtime()?;
        rt.block_on(async {
            let (tracker, clock, _) = tracker_at(monday, Utc.fix());
            let mut counts = Vec::new();
            for _ in 0..days {
                counts.push(tracker.check_in("u1").await.count);
                clock.advance(chrono::Duration::days(1));
            }
            let expected: Vec<i64> = (1..=i64::try_from(days).unwrap()).collect();
            prop_assert_eq!(counts, expected);
            Ok(())
        })?;
    }

    /// The daily like reward grants exactly `cap` times per day.
    #[test]
    fn like_reward_grants_cap_times_per_day(cap in 0i64..6, likes in 1usize..10) {
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 1, 0, 0).unwrap();
        let rt = runtime()?;
        rt.block_on(async {
            let (tracker, clock, _) = tracker_at(start, Utc.fix());
            let mut granted = 0i64;
            for i in 0..likes {
                let reward = tracker.like_reward("u1", cap).await;
                prop_assert_eq!(reward.count, i64::try_from(i).unwrap() + 1);
                if reward.granted {
                    granted += 1;
                }
                clock.advance(chrono::Duration::minutes(1));
            }
            let total = i64::try_from(likes).unwrap();
            // The first like of a day always rewards.
            prop_assert_eq!(granted, cap.max(1).min(total));
            Ok(())
        })?;
    }
}
