//! In-memory collaborators for engine tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::entry::{EntryAnalysis, LogEntry};
use crate::store::{LogStore, StateStore, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Fake log store over a fixed entry list. `fail_queries_after` makes
/// `query_range` error from the Nth call on, for partial-failure paths.
#[derive(Default)]
pub struct MemoryLogStore {
    pub entries: Mutex<Vec<LogEntry>>,
    pub queries: AtomicUsize,
    pub fail_queries_after: Option<usize>,
}

impl MemoryLogStore {
    pub fn with_entries(entries: Vec<LogEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn create_entry(
        &self,
        meta: &EntryAnalysis,
        body: &str,
        _image_url: Option<&str>,
    ) -> StoreResult<String> {
        let mut entries = self.entries.lock().unwrap();
        let id = format!("entry-{}", entries.len());
        entries.push(LogEntry {
            id: id.clone(),
            created_at: Utc::now(),
            title: meta.title.clone(),
            mood: Some(meta.mood),
            tags: meta.tags.clone(),
            body: Some(body.to_string()),
        });
        Ok(id)
    }

    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<LogEntry>> {
        let n = self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_queries_after {
            if n >= limit {
                return Err(StoreError::Api {
                    status: 503,
                    message: "synthetic outage".into(),
                });
            }
        }
        let mut hits: Vec<LogEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.created_at >= start && e.created_at < end)
            .map(|e| LogEntry {
                body: None,
                ..e.clone()
            })
            .collect();
        hits.sort_by_key(|e| e.created_at);
        Ok(hits)
    }

    async fn fetch_entry(&self, entry_id: &str) -> StoreResult<LogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(entry_id.to_string()))
    }

    async fn fetch_body(&self, entry_id: &str) -> StoreResult<String> {
        let entry = self.fetch_entry(entry_id).await?;
        Ok(entry.body.unwrap_or_default())
    }

    async fn list_ids_and_dates(&self) -> StoreResult<Vec<(String, DateTime<Utc>)>> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.id.clone(), e.created_at))
            .collect())
    }
}
