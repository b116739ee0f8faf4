//! Notion-backed [`LogStore`]. Entries live as pages in one database with
//! `Name` (title), `Mood` (select) and `Tags` (multi-select) properties;
//! the body is stored as paragraph blocks and fetched lazily.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::models::entry::{EntryAnalysis, LogEntry, Mood, Tag};
use crate::store::{LogStore, StoreError, StoreResult};

const NOTION_API: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Notion caps a rich text content block at 2000 characters.
const BODY_LIMIT: usize = 2000;

/// Upper bound on pagination rounds for a single query. At 100 pages per
/// round this covers years of single-user history.
const MAX_QUERY_PAGES: usize = 50;

pub struct NotionLogStore {
    client: Client,
    token: String,
    database_id: String,
}

impl NotionLogStore {
    pub fn new(token: &str, database_id: &str) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build http client");
        Self {
            client,
            token: token.to_string(),
            database_id: database_id.to_string(),
        }
    }

    async fn check(response: reqwest::Response) -> StoreResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message: String = message.chars().take(200).collect();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn query_pages(&self, filter: Option<serde_json::Value>) -> StoreResult<Vec<Page>> {
        let url = format!("{}/databases/{}/query", NOTION_API, self.database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_QUERY_PAGES {
            let mut body = json!({
                "sorts": [{ "timestamp": "created_time", "direction": "ascending" }],
                "page_size": 100,
            });
            if let Some(filter) = &filter {
                body["filter"] = filter.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION)
                .json(&body)
                .send()
                .await?;
            let parsed: QueryResponse = Self::check(response).await?.json().await?;

            pages.extend(parsed.results);
            if !parsed.has_more {
                break;
            }
            cursor = parsed.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(pages)
    }
}

#[async_trait]
impl LogStore for NotionLogStore {
    async fn create_entry(
        &self,
        meta: &EntryAnalysis,
        body: &str,
        image_url: Option<&str>,
    ) -> StoreResult<String> {
        let safe_body: String = body.chars().take(BODY_LIMIT).collect();

        let mut children = vec![json!({
            "object": "block",
            "type": "paragraph",
            "paragraph": {
                "rich_text": [{ "type": "text", "text": { "content": safe_body } }]
            }
        })];
        if let Some(url) = image_url {
            children.push(json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [
                        { "type": "text", "text": { "content": "🔗 " } },
                        {
                            "type": "text",
                            "text": { "content": "写真を開く", "link": { "url": url } }
                        }
                    ]
                }
            }));
        }

        let payload = json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                "Name": { "title": [{ "text": { "content": meta.title } }] },
                "Mood": { "select": { "name": meta.mood.as_str() } },
                "Tags": {
                    "multi_select": meta.tags.iter()
                        .map(|t| json!({ "name": t.as_str() }))
                        .collect::<Vec<_>>()
                },
            },
            "children": children,
        });

        let response = self
            .client
            .post(format!("{}/pages", NOTION_API))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&payload)
            .send()
            .await?;
        let page: Page = Self::check(response).await?.json().await?;
        Ok(page.id)
    }

    async fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<LogEntry>> {
        let filter = json!({
            "and": [
                {
                    "timestamp": "created_time",
                    "created_time": { "on_or_after": start.to_rfc3339() }
                },
                {
                    "timestamp": "created_time",
                    "created_time": { "before": end.to_rfc3339() }
                }
            ]
        });

        let pages = self.query_pages(Some(filter)).await?;
        let mut entries: Vec<LogEntry> = pages.into_iter().map(LogEntry::from).collect();
        // Pages arrive sorted per response, but cross-page order is not a
        // contract we rely on.
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    async fn fetch_entry(&self, entry_id: &str) -> StoreResult<LogEntry> {
        let response = self
            .client
            .get(format!("{}/pages/{}", NOTION_API, entry_id))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Err(StoreError::NotFound(entry_id.to_string()));
        }
        let page: Page = Self::check(response).await?.json().await?;
        Ok(page.into())
    }

    async fn fetch_body(&self, entry_id: &str) -> StoreResult<String> {
        let mut text = String::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_QUERY_PAGES {
            let mut url = format!(
                "{}/blocks/{}/children?page_size=100",
                NOTION_API, entry_id
            );
            if let Some(cursor) = &cursor {
                url.push_str(&format!("&start_cursor={}", cursor));
            }

            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header("Notion-Version", NOTION_VERSION)
                .send()
                .await?;
            let parsed: BlockChildrenResponse = Self::check(response).await?.json().await?;

            for block in parsed.results {
                if let Some(paragraph) = block.paragraph {
                    for rich in paragraph.rich_text {
                        text.push_str(&rich.plain_text);
                    }
                    text.push('\n');
                }
            }
            if !parsed.has_more {
                break;
            }
            cursor = parsed.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(text.trim_end().to_string())
    }

    async fn list_ids_and_dates(&self) -> StoreResult<Vec<(String, DateTime<Utc>)>> {
        let pages = self.query_pages(None).await?;
        Ok(pages
            .into_iter()
            .map(|p| (p.id, p.created_time))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct QueryResponse {
    results: Vec<Page>,
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Page {
    id: String,
    created_time: DateTime<Utc>,
    #[serde(default)]
    properties: PageProperties,
}

#[derive(Deserialize, Default)]
struct PageProperties {
    #[serde(rename = "Name")]
    name: Option<TitleProperty>,
    #[serde(rename = "Mood")]
    mood: Option<SelectProperty>,
    #[serde(rename = "Tags")]
    tags: Option<MultiSelectProperty>,
}

#[derive(Deserialize)]
struct TitleProperty {
    #[serde(default)]
    title: Vec<RichText>,
}

#[derive(Deserialize)]
struct SelectProperty {
    select: Option<SelectValue>,
}

#[derive(Deserialize)]
struct MultiSelectProperty {
    #[serde(default)]
    multi_select: Vec<SelectValue>,
}

#[derive(Deserialize)]
struct SelectValue {
    name: String,
}

#[derive(Deserialize)]
struct RichText {
    #[serde(default)]
    plain_text: String,
}

#[derive(Deserialize)]
struct BlockChildrenResponse {
    results: Vec<Block>,
    has_more: bool,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct Block {
    #[serde(default)]
    paragraph: Option<Paragraph>,
}

#[derive(Deserialize, Default)]
struct Paragraph {
    #[serde(default)]
    rich_text: Vec<RichText>,
}

impl From<Page> for LogEntry {
    fn from(page: Page) -> Self {
        let title = page
            .properties
            .name
            .map(|p| {
                p.title
                    .into_iter()
                    .map(|r| r.plain_text)
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "無題".to_string());
        let mood = page
            .properties
            .mood
            .and_then(|p| p.select)
            .and_then(|s| Mood::parse(&s.name));
        // Unknown tag names (vocabulary drift in the database) are skipped
        // on read; writes only ever use the fixed vocabulary.
        let tags = page
            .properties
            .tags
            .map(|p| {
                p.multi_select
                    .iter()
                    .filter_map(|s| Tag::parse(&s.name))
                    .collect()
            })
            .unwrap_or_default();

        LogEntry {
            id: page.id,
            created_at: page.created_time,
            title,
            mood,
            tags,
            body: None,
        }
    }
}
