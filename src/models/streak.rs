use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Persisted streak cache, one instance per user, stored as a single JSON
/// value in the state store. `count` is only meaningful relative to
/// `last_date`: a reader must treat any state whose last date is older
/// than yesterday as an effective streak of 0 (no write happens on idle
/// days, so staleness is a read-time concern).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreakState {
    pub count: u32,
    pub last_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub total_days: u32,
}

/// What a streak query reports for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreakSnapshot {
    pub count: u32,
    pub start_date: Option<NaiveDate>,
    pub has_today_record: bool,
}
