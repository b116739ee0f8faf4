//! Incremental "consecutive days recorded" tracking. The persisted
//! [`StreakState`] is updated in O(1) on each new entry; when no cache
//! exists yet it is reconstructed by a bounded backward scan over the log
//! store.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, NaiveDate};

use crate::models::streak::{StreakSnapshot, StreakState};
use crate::services::time;
use crate::store::{self, keys, LogStore, StateStore, StoreResult};

/// Fetch window for the cold-start rebuild. A tunable, not a correctness
/// requirement.
const REBUILD_WINDOW_DAYS: i64 = 30;

/// Lookback cap: about three years of windows. Scanning stops earlier at
/// the first gap in the consecutive run.
const MAX_REBUILD_WINDOWS: i64 = 37;

pub struct StreakEngine {
    logs: Arc<dyn LogStore>,
    state: Arc<dyn StateStore>,
    tz: FixedOffset,
}

impl StreakEngine {
    pub fn new(logs: Arc<dyn LogStore>, state: Arc<dyn StateStore>, tz: FixedOffset) -> Self {
        Self { logs, state, tz }
    }

    /// Count `today` toward the streak. Idempotent per calendar day: the
    /// second entry on the same day is a no-op. The read-then-write has no
    /// atomicity guarantee; concurrent duplicate delivery is an accepted
    /// single-user risk.
    pub async fn record_entry(&self, today: NaiveDate) -> StoreResult<StreakState> {
        let mut state: StreakState =
            store::get_json(self.state.as_ref(), keys::STREAK_STATE)
                .await?
                .unwrap_or_default();

        if state.last_date == Some(today) {
            return Ok(state);
        }

        let yesterday = today - Duration::days(1);
        if state.last_date == Some(yesterday) {
            state.count += 1;
        } else {
            state.count = 1;
            state.start_date = Some(today);
        }
        state.last_date = Some(today);
        state.total_days += 1;

        store::set_json(self.state.as_ref(), keys::STREAK_STATE, &state).await?;
        Ok(state)
    }

    /// Current streak for display. Staleness is decided here, at read
    /// time: a last date older than yesterday means the stored count no
    /// longer applies, regardless of its value. When no cache exists the
    /// state is rebuilt from the log store and persisted (the one read
    /// path with a write side effect).
    pub async fn query(&self, today: NaiveDate) -> StoreResult<StreakSnapshot> {
        let cached: Option<StreakState> =
            store::get_json(self.state.as_ref(), keys::STREAK_STATE).await?;

        let Some(state) = cached else {
            let (rebuilt, snapshot) = self.rebuild(today).await;
            if let Err(e) =
                store::set_json(self.state.as_ref(), keys::STREAK_STATE, &rebuilt).await
            {
                tracing::warn!(error = %e, "failed to persist rebuilt streak state");
            }
            return Ok(snapshot);
        };

        let yesterday = today - Duration::days(1);
        let snapshot = if state.last_date == Some(today) {
            StreakSnapshot {
                count: state.count,
                start_date: state.start_date,
                has_today_record: true,
            }
        } else if state.last_date == Some(yesterday) {
            StreakSnapshot {
                count: state.count,
                start_date: state.start_date,
                has_today_record: false,
            }
        } else {
            StreakSnapshot {
                count: 0,
                start_date: None,
                has_today_record: false,
            }
        };
        Ok(snapshot)
    }

    /// Cold-start reconstruction: scan backward in fixed windows,
    /// accumulating the distinct recorded local days, and stop as soon as
    /// the consecutive run walking back from today (or yesterday, when
    /// today has no record) breaks inside the scanned range. A window
    /// fetch error stops the scan and keeps the partial result — a stale
    /// streak beats a hard failure on a display feature.
    pub async fn rebuild(&self, today: NaiveDate) -> (StreakState, StreakSnapshot) {
        let mut recorded: BTreeSet<NaiveDate> = BTreeSet::new();
        let mut window_end = today;

        for _ in 0..MAX_REBUILD_WINDOWS {
            let window_start = window_end - Duration::days(REBUILD_WINDOW_DAYS - 1);
            let (start, end) = time::day_range_utc(window_start, window_end, self.tz);
            match self.logs.query_range(start, end).await {
                Ok(entries) => {
                    recorded.extend(entries.iter().map(|e| e.local_date(self.tz)));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "streak rebuild fetch failed, keeping partial scan");
                    break;
                }
            }

            let anchor = if recorded.contains(&today) {
                today
            } else {
                today - Duration::days(1)
            };
            let mut day = anchor;
            while day >= window_start && recorded.contains(&day) {
                day -= Duration::days(1);
            }
            if day >= window_start {
                // The break lies inside the scanned range; older windows
                // cannot extend the run.
                break;
            }
            window_end = window_start - Duration::days(1);
        }

        let has_today_record = recorded.contains(&today);
        let anchor = if has_today_record {
            today
        } else {
            today - Duration::days(1)
        };
        let mut count: u32 = 0;
        let mut day = anchor;
        while recorded.contains(&day) {
            count += 1;
            day -= Duration::days(1);
        }
        let start_date = if count > 0 {
            Some(anchor - Duration::days(count as i64 - 1))
        } else {
            None
        };

        let state = StreakState {
            count,
            last_date: recorded.iter().next_back().copied(),
            start_date,
            total_days: recorded.len() as u32,
        };
        let snapshot = StreakSnapshot {
            count,
            start_date,
            has_today_record,
        };
        (state, snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    use crate::models::entry::{LogEntry, Mood, Tag};
    use crate::store::fakes::{MemoryLogStore, MemoryStateStore};

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry_on(date: NaiveDate) -> LogEntry {
        LogEntry {
            id: format!("page-{}", date),
            created_at: time::day_start_utc(date, jst()) + Duration::hours(12),
            title: "テスト".into(),
            mood: Some(Mood::Happy),
            tags: vec![Tag::Other],
            body: None,
        }
    }

    fn engine_with(days: &[NaiveDate]) -> (StreakEngine, Arc<MemoryLogStore>, Arc<MemoryStateStore>) {
        let logs = Arc::new(MemoryLogStore::with_entries(
            days.iter().map(|d| entry_on(*d)).collect(),
        ));
        let state = Arc::new(MemoryStateStore::default());
        let engine = StreakEngine::new(logs.clone(), state.clone(), jst());
        (engine, logs, state)
    }

    async fn stored_state(state: &MemoryStateStore) -> Option<StreakState> {
        store::get_json(state, keys::STREAK_STATE).await.unwrap()
    }

    #[tokio::test]
    async fn same_day_recording_is_idempotent() {
        let (engine, _, state) = engine_with(&[]);
        let d = day(2025, 3, 1);

        engine.record_entry(d).await.unwrap();
        let after_one = stored_state(&state).await.unwrap();
        engine.record_entry(d).await.unwrap();
        engine.record_entry(d).await.unwrap();
        let after_three = stored_state(&state).await.unwrap();

        assert_eq!(after_one, after_three);
        assert_eq!(after_three.count, 1);
        assert_eq!(after_three.total_days, 1);
    }

    #[tokio::test]
    async fn consecutive_days_extend_the_streak() {
        let (engine, _, _) = engine_with(&[]);
        engine.record_entry(day(2025, 3, 1)).await.unwrap();
        let state = engine.record_entry(day(2025, 3, 2)).await.unwrap();

        assert_eq!(state.count, 2);
        assert_eq!(state.start_date, Some(day(2025, 3, 1)));
        assert_eq!(state.total_days, 2);
    }

    #[tokio::test]
    async fn gap_resets_the_streak() {
        let (engine, _, _) = engine_with(&[]);
        engine.record_entry(day(2025, 3, 1)).await.unwrap();
        let state = engine.record_entry(day(2025, 3, 4)).await.unwrap();

        assert_eq!(state.count, 1);
        assert_eq!(state.start_date, Some(day(2025, 3, 4)));
        assert_eq!(state.total_days, 2);
    }

    #[tokio::test]
    async fn lapse_is_detected_at_read_time() {
        let (engine, _, state) = engine_with(&[]);
        engine.record_entry(day(2025, 3, 1)).await.unwrap();

        let snap = engine.query(day(2025, 3, 3)).await.unwrap();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.start_date, None);
        assert!(!snap.has_today_record);

        // The stored count is untouched; no write happens on idle days.
        assert_eq!(stored_state(&state).await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn yesterday_still_counts_as_active() {
        let (engine, _, _) = engine_with(&[]);
        engine.record_entry(day(2025, 3, 1)).await.unwrap();
        engine.record_entry(day(2025, 3, 2)).await.unwrap();

        let snap = engine.query(day(2025, 3, 3)).await.unwrap();
        assert_eq!(snap.count, 2);
        assert_eq!(snap.start_date, Some(day(2025, 3, 1)));
        assert!(!snap.has_today_record);
    }

    #[tokio::test]
    async fn query_without_cache_rebuilds_and_persists() {
        let days = [day(2025, 3, 1), day(2025, 3, 2), day(2025, 3, 3)];
        let (engine, _, state) = engine_with(&days);

        let snap = engine.query(day(2025, 3, 3)).await.unwrap();
        assert_eq!(snap.count, 3);
        assert!(snap.has_today_record);
        assert_eq!(snap.start_date, Some(day(2025, 3, 1)));

        let cached = stored_state(&state).await.unwrap();
        assert_eq!(cached.count, 3);
        assert_eq!(cached.last_date, Some(day(2025, 3, 3)));
        assert_eq!(cached.total_days, 3);
    }

    #[tokio::test]
    async fn rebuild_counts_back_from_yesterday_when_today_is_empty() {
        let days = [day(2025, 3, 1), day(2025, 3, 2)];
        let (engine, _, _) = engine_with(&days);

        let (_, snap) = engine.rebuild(day(2025, 3, 3)).await;
        assert_eq!(snap.count, 2);
        assert!(!snap.has_today_record);
        assert_eq!(snap.start_date, Some(day(2025, 3, 1)));
    }

    #[tokio::test]
    async fn rebuild_matches_incremental_recording() {
        let days = [
            day(2025, 2, 26),
            day(2025, 2, 27),
            day(2025, 2, 28),
            day(2025, 3, 1),
        ];

        let (incremental, _, inc_state) = engine_with(&[]);
        for d in days {
            incremental.record_entry(d).await.unwrap();
        }
        let expected = stored_state(&inc_state).await.unwrap();

        let (cold, _, _) = engine_with(&days);
        let (rebuilt, _) = cold.rebuild(day(2025, 3, 1)).await;

        assert_eq!(rebuilt.count, expected.count);
        assert_eq!(rebuilt.start_date, expected.start_date);
        assert_eq!(rebuilt.last_date, expected.last_date);
        assert_eq!(rebuilt.total_days, expected.total_days);
    }

    #[tokio::test]
    async fn rebuild_spans_multiple_windows() {
        // 45 consecutive days ending today crosses the 30-day window.
        let today = day(2025, 6, 30);
        let days: Vec<NaiveDate> = (0..45).map(|i| today - Duration::days(i)).collect();
        let (engine, logs, _) = engine_with(&days);

        let (_, snap) = engine.rebuild(today).await;
        assert_eq!(snap.count, 45);
        assert!(logs.queries.load(std::sync::atomic::Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn rebuild_keeps_partial_result_on_fetch_failure() {
        let today = day(2025, 6, 30);
        let days: Vec<NaiveDate> = (0..45).map(|i| today - Duration::days(i)).collect();
        let logs = Arc::new(MemoryLogStore {
            fail_queries_after: Some(1),
            ..MemoryLogStore::with_entries(days.iter().map(|d| entry_on(*d)).collect())
        });
        let state = Arc::new(MemoryStateStore::default());
        let engine = StreakEngine::new(logs, state, jst());

        // The second window fails; the first window's 30 days survive.
        let (_, snap) = engine.rebuild(today).await;
        assert_eq!(snap.count, 30);
        assert!(snap.has_today_record);
    }

    #[tokio::test]
    async fn lapsed_history_rebuilds_to_zero() {
        let days = [day(2025, 3, 1), day(2025, 3, 2)];
        let (engine, _, _) = engine_with(&days);

        let (state, snap) = engine.rebuild(day(2025, 3, 10)).await;
        assert_eq!(snap.count, 0);
        assert_eq!(snap.start_date, None);
        assert_eq!(state.last_date, Some(day(2025, 3, 2)));
        assert_eq!(state.total_days, 2);
    }
}
