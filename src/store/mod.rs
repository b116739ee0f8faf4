//! External collaborator contracts. The core engines only see these two
//! traits, so tests inject in-memory fakes and the adapters stay thin.

pub mod notion;
pub mod state;

#[cfg(test)]
pub mod fakes;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::entry::{EntryAnalysis, LogEntry};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("state db error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Document-database port for diary entries. Implementations own
/// pagination: range queries return a fully materialized list, sorted by
/// creation time ascending.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Create a new entry; returns the store-assigned opaque id.
    async fn create_entry(
        &self,
        meta: &EntryAnalysis,
        body: &str,
        image_url: Option<&str>,
    ) -> StoreResult<String>;

    /// All entries created within `[start, end)`, metadata only
    /// (`body: None`), creation-time ascending.
    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<LogEntry>>;

    /// Metadata for a single entry.
    async fn fetch_entry(&self, entry_id: &str) -> StoreResult<LogEntry>;

    /// Full body text for a single entry. A separate, more expensive call;
    /// only used where the full text is genuinely needed.
    async fn fetch_body(&self, entry_id: &str) -> StoreResult<String>;

    /// Ids and creation times of every entry, for uniform-random sampling
    /// over entries (not days).
    async fn list_ids_and_dates(&self) -> StoreResult<Vec<(String, DateTime<Utc>)>>;
}

/// Small string-keyed state store for cross-invocation state (streak
/// cache, review history, last review texts).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// State keys. Each key has exactly one serialized shape; the typed
/// accessors in `state` own the (de)serialization.
pub mod keys {
    pub const STREAK_STATE: &str = "streak_state";
    pub const WEEKLY_HISTORY: &str = "weekly_review_history";
    pub const LAST_WEEKLY_REVIEW: &str = "last_weekly_review";
    pub const LAST_MONTHLY_REVIEW: &str = "last_monthly_review";
}

/// Typed read through a [`StateStore`].
pub async fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> StoreResult<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Typed write through a [`StateStore`].
pub async fn set_json<T: serde::Serialize>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw).await
}
