use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Mood symbols as stored in the Notion select and produced by the AI layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mood {
    #[serde(rename = "🤩")]
    Excited,
    #[serde(rename = "😊")]
    Happy,
    #[serde(rename = "😐")]
    Neutral,
    #[serde(rename = "😰")]
    Anxious,
    #[serde(rename = "😡")]
    Angry,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::Excited,
        Mood::Happy,
        Mood::Neutral,
        Mood::Anxious,
        Mood::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Excited => "🤩",
            Mood::Happy => "😊",
            Mood::Neutral => "😐",
            Mood::Anxious => "😰",
            Mood::Angry => "😡",
        }
    }

    pub fn parse(s: &str) -> Option<Mood> {
        Mood::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed tag vocabulary for the Tags multi-select. `その他` is the
/// catch-all; the AI prompt instructs it never co-occurs with a specific
/// tag, but stored data is not trusted to honor that.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Tag {
    #[serde(rename = "研究")]
    Research,
    #[serde(rename = "筋トレ")]
    Workout,
    #[serde(rename = "勉強")]
    Study,
    #[serde(rename = "趣味")]
    Hobby,
    #[serde(rename = "恋愛")]
    Love,
    #[serde(rename = "食事")]
    Meal,
    #[serde(rename = "写真")]
    Photo,
    #[serde(rename = "その他")]
    Other,
}

impl Tag {
    pub const ALL: [Tag; 8] = [
        Tag::Research,
        Tag::Workout,
        Tag::Study,
        Tag::Hobby,
        Tag::Love,
        Tag::Meal,
        Tag::Photo,
        Tag::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Research => "研究",
            Tag::Workout => "筋トレ",
            Tag::Study => "勉強",
            Tag::Hobby => "趣味",
            Tag::Love => "恋愛",
            Tag::Meal => "食事",
            Tag::Photo => "写真",
            Tag::Other => "その他",
        }
    }

    pub fn parse(s: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diary record as read back from the log store. `body` is only
/// populated by the separate (expensive) block fetch; most query paths
/// work with metadata alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub mood: Option<Mood>,
    pub tags: Vec<Tag>,
    pub body: Option<String>,
}

impl LogEntry {
    pub fn local_date(&self, tz: FixedOffset) -> NaiveDate {
        self.created_at.with_timezone(&tz).date_naive()
    }

    pub fn mood_label(&self) -> &'static str {
        self.mood.map(|m| m.as_str()).unwrap_or("不明")
    }

    pub fn tag_labels(&self) -> String {
        if self.tags.is_empty() {
            "なし".to_string()
        } else {
            self.tags
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(",")
        }
    }
}

/// Validated output of the AI enrichment call. Construction goes through
/// the parser in `crate::ai`; these constructors are the caller-side
/// fallbacks when enrichment fails.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryAnalysis {
    pub title: String,
    pub mood: Mood,
    pub tags: Vec<Tag>,
}

impl EntryAnalysis {
    pub fn fallback_text() -> Self {
        Self {
            title: "📝 日記".into(),
            mood: Mood::Neutral,
            tags: vec![Tag::Other],
        }
    }

    pub fn fallback_photo() -> Self {
        Self {
            title: "📷 写真日記".into(),
            mood: Mood::Neutral,
            tags: vec![Tag::Photo],
        }
    }

    pub fn error_record() -> Self {
        Self {
            title: "❌ システムエラー".into(),
            mood: Mood::Anxious,
            tags: vec![Tag::Other],
        }
    }
}
