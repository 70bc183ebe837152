//! Time-window streak counters on the expiring key-value store.
//!
//! Each `(feature, user)` pair owns two keys: `<feature>Times<user>` holds the
//! event count and `<feature>Dates<user>` the Unix time of the last event,
//! both decimal strings. Every transition rewrites both keys with the
//! window's TTL. Reads and writes are plain get-then-set, so concurrent events
//! for one subject may race.
//!
//! Counter failures never surface: any read, parse, or write error ends the
//! transition with no reward.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use parking_lot::Mutex;
use pawprint_core::calendar::{is_previous_day, same_calendar_day, same_iso_week};
use pawprint_core::StreakWindow;

use crate::error::{StoreError, StoreResult};
use crate::storage::counter::CounterStore;

/// Feature prefix of the daily like reward keys.
pub const LIKE_FEATURE: &str = "like";
/// Feature prefix of the weekly check-in keys.
pub const CHECK_IN_FEATURE: &str = "checkIn";

/// Source of "now" for streak decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Where the current event falls relative to the last recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakState {
    NoPriorEvent,
    /// Same calendar day as the last event.
    SameWindowAlreadyCounted,
    /// Daily: last event was the previous day. Weekly: same ISO week.
    WindowContinued,
    /// Anything further apart.
    WindowBroken,
}

/// Classifies `now` against the last event under `window`.
#[must_use]
pub fn classify(
    last: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: StreakWindow,
    tz: FixedOffset,
) -> StreakState {
    let Some(last) = last else {
        return StreakState::NoPriorEvent;
    };
    if same_calendar_day(last, now, tz) {
        return StreakState::SameWindowAlreadyCounted;
    }
    let continued = match window {
        StreakWindow::Daily => is_previous_day(last, now, tz),
        StreakWindow::Weekly => same_iso_week(last, now, tz),
    };
    if continued {
        StreakState::WindowContinued
    } else {
        StreakState::WindowBroken
    }
}

/// Outcome of a rewarded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reward {
    pub granted: bool,
    /// Event count in the current window after this event.
    pub count: i64,
}

impl Reward {
    const DENIED: Self = Self {
        granted: false,
        count: 0,
    };
}

/// Streak bookkeeping for the like reward, first-of-day checks, and check-in.
pub struct StreakTracker {
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    tz: FixedOffset,
}

impl StreakTracker {
    pub fn new(counters: Arc<dyn CounterStore>, clock: Arc<dyn Clock>, tz: FixedOffset) -> Self {
        Self {
            counters,
            clock,
            tz,
        }
    }

    /// Daily like reward with a cap on rewarded likes per day.
    ///
    /// On the same day the count keeps growing; the reward is granted while
    /// the count *before* this like is below `cap`. Any other day restarts
    /// the count at 1 with a reward.
    pub async fn like_reward(&self, user_id: &str, cap: i64) -> Reward {
        match self.try_like_reward(user_id, cap).await {
            Ok(reward) => reward,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "like reward counter unavailable, no reward");
                Reward::DENIED
            }
        }
    }

    async fn try_like_reward(&self, user_id: &str, cap: i64) -> StoreResult<Reward> {
        let (times_key, dates_key) = keys(LIKE_FEATURE, user_id);
        let times = self.read_count(&times_key).await?;
        let last = self.read_time(&dates_key).await?;
        let now = self.clock.now();

        let reward = match classify(last, now, StreakWindow::Daily, self.tz) {
            StreakState::SameWindowAlreadyCounted => Reward {
                granted: times < cap,
                count: times + 1,
            },
            StreakState::NoPriorEvent
            | StreakState::WindowContinued
            | StreakState::WindowBroken => Reward {
                granted: true,
                count: 1,
            },
        };
        self.write(&times_key, &dates_key, reward.count, now, StreakWindow::Daily)
            .await?;
        Ok(reward)
    }

    /// Whether this is the subject's first event of the day for `feature`.
    /// Refreshes the day marker when it is.
    pub async fn first_of_day(&self, feature: &str, user_id: &str) -> bool {
        let (_, dates_key) = keys(feature, user_id);
        let result: StoreResult<bool> = async {
            let last = self.read_time(&dates_key).await?;
            let now = self.clock.now();
            if classify(last, now, StreakWindow::Daily, self.tz)
                == StreakState::SameWindowAlreadyCounted
            {
                return Ok(false);
            }
            self.counters
                .set_ex(&dates_key, &now.timestamp().to_string(), ttl(StreakWindow::Daily))
                .await?;
            Ok(true)
        }
        .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(feature, user_id, error = %e, "day marker unavailable, not first");
            false
        })
    }

    /// Weekly check-in. A second check-in on the same day is rejected without
    /// touching state. Otherwise the count grows within one ISO week and
    /// restarts at 1 in a new one; both grant the reward.
    pub async fn check_in(&self, user_id: &str) -> Reward {
        match self.try_check_in(user_id).await {
            Ok(reward) => reward,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "check-in counter unavailable, no reward");
                Reward::DENIED
            }
        }
    }

    async fn try_check_in(&self, user_id: &str) -> StoreResult<Reward> {
        let (times_key, dates_key) = keys(CHECK_IN_FEATURE, user_id);
        let times = self.read_count(&times_key).await?;
        let last = self.read_time(&dates_key).await?;
        let now = self.clock.now();

        let count = match classify(last, now, StreakWindow::Weekly, self.tz) {
            StreakState::SameWindowAlreadyCounted => {
                return Ok(Reward {
                    granted: false,
                    count: times,
                });
            }
            StreakState::WindowContinued => times + 1,
            StreakState::NoPriorEvent | StreakState::WindowBroken => 1,
        };
        self.write(&times_key, &dates_key, count, now, StreakWindow::Weekly)
            .await?;
        Ok(Reward {
            granted: true,
            count,
        })
    }

    async fn read_count(&self, key: &str) -> StoreResult<i64> {
        match self.counters.get(key).await? {
            None => Ok(0),
            Some(raw) => raw.parse().map_err(|e| malformed(key, &raw, e)),
        }
    }

    async fn read_time(&self, key: &str) -> StoreResult<Option<DateTime<Utc>>> {
        let Some(raw) = self.counters.get(key).await? else {
            return Ok(None);
        };
        let secs: i64 = raw.parse().map_err(|e| malformed(key, &raw, e))?;
        DateTime::from_timestamp(secs, 0)
            .map(Some)
            .ok_or_else(|| StoreError::backend(anyhow::anyhow!("{key} holds out-of-range time {secs}")))
    }

    async fn write(
        &self,
        times_key: &str,
        dates_key: &str,
        count: i64,
        now: DateTime<Utc>,
        window: StreakWindow,
    ) -> StoreResult<()> {
        let ttl = ttl(window);
        self.counters
            .set_ex(times_key, &count.to_string(), ttl)
            .await?;
        self.counters
            .set_ex(dates_key, &now.timestamp().to_string(), ttl)
            .await
    }
}

fn keys(feature: &str, user_id: &str) -> (String, String) {
    (
        format!("{feature}Times{user_id}"),
        format!("{feature}Dates{user_id}"),
    )
}

fn ttl(window: StreakWindow) -> Duration {
    Duration::from_secs(window.ttl_secs())
}

fn malformed(key: &str, raw: &str, err: std::num::ParseIntError) -> StoreError {
    StoreError::backend(anyhow::anyhow!("{key} holds non-numeric value {raw:?}: {err}"))
}
