//! Gemini `generateContent` client: JSON-mode entry analysis and plain
//! text review generation.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::ai::{with_fallbacks, FallbackError};
use crate::models::entry::{EntryAnalysis, Mood, Tag};

const GEMINI_API: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    candidates: Vec<String>,
}

impl GeminiClient {
    pub fn new(api_key: &str, candidates: Vec<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build http client");
        Self {
            client,
            api_key: api_key.to_string(),
            candidates,
        }
    }

    /// Enrich a raw diary text into title/mood/tags. Returns the
    /// aggregated failure when every model candidate fails; the caller
    /// decides the fallback default.
    pub async fn analyze_entry(&self, text: &str) -> Result<EntryAnalysis, FallbackError> {
        let prompt = analysis_prompt(text);
        with_fallbacks(&self.candidates, |model| self.call_analysis(model, &prompt)).await
    }

    /// Generate the narrative text for a weekly/monthly review.
    pub async fn generate_review(&self, prompt: &str) -> Result<String, FallbackError> {
        with_fallbacks(&self.candidates, |model| self.call_text(model, prompt)).await
    }

    async fn call_analysis(&self, model: &str, prompt: &str) -> anyhow::Result<EntryAnalysis> {
        let request = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": { "response_mime_type": "application/json" }
        });
        let raw = self.generate(model, &request).await?;
        parse_analysis(&raw)
    }

    async fn call_text(&self, model: &str, prompt: &str) -> anyhow::Result<String> {
        let request = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        self.generate(model, &request).await
    }

    async fn generate(&self, model: &str, request: &serde_json::Value) -> anyhow::Result<String> {
        let url = format!("{}/{}:generateContent?key={}", GEMINI_API, model, self.api_key);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        let parsed: GenerateContentResponse = response.json().await?;
        parsed
            .candidates
            .into_iter()
            .flatten()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow::anyhow!("empty response"))
    }
}

fn analysis_prompt(text: &str) -> String {
    let moods: Vec<&str> = Mood::ALL.iter().map(|m| m.as_str()).collect();
    let tags: Vec<String> = Tag::ALL.iter().map(|t| format!("\"{}\"", t)).collect();
    format!(
        "テキストを分析しJSONを返してください。入力: {}\n\n\
         出力JSON形式: {{ \"title\": \"...\", \"mood\": \"{}\", \"tags\": [{}] }}\n\
         - titleは20文字以内\n\
         - tagsは該当するものだけを選ぶこと\n\
         - 「その他」は他のタグと同時に付けないこと",
        text,
        moods.join("/"),
        tags.join(","),
    )
}

/// Validated parse of the enrichment output. Missing or out-of-vocabulary
/// fields fail explicitly; silently defaulting here would hide broken
/// model output behind plausible-looking entries.
pub fn parse_analysis(raw: &str) -> anyhow::Result<EntryAnalysis> {
    // The model occasionally wraps the object in prose even in JSON mode.
    let start = raw
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("no JSON object in response"))?;
    let end = raw
        .rfind('}')
        .filter(|&end| end >= start)
        .ok_or_else(|| anyhow::anyhow!("no JSON object in response"))?;
    let parsed: RawAnalysis = serde_json::from_str(&raw[start..=end])?;

    let title = parsed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow::anyhow!("missing title"))?;

    let mood_raw = parsed.mood.ok_or_else(|| anyhow::anyhow!("missing mood"))?;
    let mood =
        Mood::parse(&mood_raw).ok_or_else(|| anyhow::anyhow!("unknown mood: {}", mood_raw))?;

    let tag_names = parsed.tags.ok_or_else(|| anyhow::anyhow!("missing tags"))?;
    if tag_names.is_empty() {
        anyhow::bail!("empty tags");
    }
    let mut tags = Vec::with_capacity(tag_names.len());
    for name in &tag_names {
        let tag =
            Tag::parse(name).ok_or_else(|| anyhow::anyhow!("unknown tag: {}", name))?;
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(EntryAnalysis { title, mood, tags })
}

#[derive(Deserialize)]
struct RawAnalysis {
    title: Option<String>,
    mood: Option<String>,
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}
