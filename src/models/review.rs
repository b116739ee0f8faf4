use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Rolling buffer capacity for past weekly reviews kept as monthly-review
/// input.
pub const REVIEW_HISTORY_CAPACITY: usize = 5;

/// Review text is clipped to this many characters before being persisted
/// (both the last-review keys and the history buffer).
pub const STORED_REVIEW_TEXT_LIMIT: usize = 1000;

/// One past weekly review, as kept in the rolling history buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    pub date: NaiveDate,
    pub text: String,
}
