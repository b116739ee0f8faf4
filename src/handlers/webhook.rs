//! LINE webhook: signature check, event parsing, and the entry-recording
//! flow. Once the signature checks out the route always acknowledges with
//! 200 `ok` — per-event failures are handled (and logged) inside.

use axum::{body::Bytes, extract::State, http::HeaderMap, http::StatusCode};
use serde::Deserialize;

use crate::handlers::commands;
use crate::line;
use crate::models::entry::EntryAnalysis;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub reply_token: Option<String>,
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub text: Option<String>,
}

pub async fn line_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !line::verify_signature(&state.config.line_channel_secret, &body, signature) {
        tracing::warn!("webhook signature mismatch");
        return (StatusCode::UNAUTHORIZED, "bad signature");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook payload");
            return (StatusCode::OK, "ok");
        }
    };

    for event in payload.events {
        handle_event(&state, event).await;
    }
    (StatusCode::OK, "ok")
}

async fn handle_event(state: &AppState, event: WebhookEvent) {
    if event.kind != "message" {
        return;
    }
    let Some(message) = event.message else {
        return;
    };
    let reply_token = event.reply_token.as_deref();

    match message.kind.as_str() {
        "text" => {
            let text = message.text.unwrap_or_default();
            let text = text.trim();
            if text.is_empty() {
                return;
            }
            if let Some(input) = text.strip_prefix(commands::COMMAND_MARKER) {
                let reply = commands::dispatch(state, input).await;
                send_reply(state, reply_token, &reply).await;
            } else {
                record_text_entry(state, text, reply_token).await;
            }
        }
        "image" => {
            // Binary storage is handled outside this service; the diary
            // keeps a reference to the platform message.
            let note = format!("📷 写真をアップロードしました (message id: {})", message.id);
            persist_entry(state, &EntryAnalysis::fallback_photo(), &note, None, reply_token)
                .await;
        }
        _ => {}
    }
}

/// Enrich and record one text entry. Analysis failure degrades to the
/// default uncategorized meta with the raw text preserved — capture is
/// never blocked by enrichment.
async fn record_text_entry(state: &AppState, text: &str, reply_token: Option<&str>) {
    let (meta, body) = match state.ai.analyze_entry(text).await {
        Ok(meta) => (meta, text.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "entry analysis failed, recording unclassified");
            let body = format!(
                "⚠️ AI解析失敗\n\n【エラー】\n{}\n\n【原文】\n{}",
                e, text
            );
            (EntryAnalysis::fallback_text(), body)
        }
    };
    persist_entry(state, &meta, &body, None, reply_token).await;
}

async fn persist_entry(
    state: &AppState,
    meta: &EntryAnalysis,
    body: &str,
    image_url: Option<&str>,
    reply_token: Option<&str>,
) {
    if let Err(e) = state.logs.create_entry(meta, body, image_url).await {
        tracing::error!(error = %e, "entry write failed");
        // Keep at least the failure itself in the store. If even that
        // write fails, log and still acknowledge.
        let error_body = format!("{}\n\n【原文】\n{}", e, body);
        if let Err(e) = state
            .logs
            .create_entry(&EntryAnalysis::error_record(), &error_body, None)
            .await
        {
            tracing::error!(error = %e, "error record write also failed");
        }
        send_reply(
            state,
            reply_token,
            "⚠️ 記録の保存に失敗しました。時間をおいて再度お試しください。",
        )
        .await;
        return;
    }

    let today = state.config.today_local();
    let ack = match state.streak.record_entry(today).await {
        Ok(streak) => format!(
            "📝 記録しました「{}」\n🔥 連続{}日目",
            meta.title, streak.count
        ),
        Err(e) => {
            tracing::warn!(error = %e, "streak update failed");
            format!("📝 記録しました「{}」", meta.title)
        }
    };
    send_reply(state, reply_token, &ack).await;
}

async fn send_reply(state: &AppState, reply_token: Option<&str>, text: &str) {
    let Some(token) = reply_token else {
        return;
    };
    if let Err(e) = state.line.reply(token, text).await {
        tracing::warn!(error = %e, "reply delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::Engine as _;
    use http_body_util::BodyExt;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;
    use tower::ServiceExt;

    use crate::ai::GeminiClient;
    use crate::config::Config;
    use crate::line::LineClient;
    use crate::models::streak::StreakState;
    use crate::services::streak::StreakEngine;
    use crate::store::fakes::{MemoryLogStore, MemoryStateStore};
    use crate::store::{self, keys, LogStore, StateStore};
    use crate::{app, AppState};

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".into(),
            port: 0,
            state_db_path: ":memory:".into(),
            line_token: "token".into(),
            line_channel_secret: "secret".into(),
            line_user_id: "user".into(),
            notion_token: "notion".into(),
            notion_db_id: "db".into(),
            gemini_api_key: "key".into(),
            // No candidates: every AI call fails fast without network.
            gemini_models: Vec::new(),
            user_profile: "テストユーザー".into(),
            tz_offset_hours: 9,
            reminder_hour: 21,
            review_weekday: chrono::Weekday::Sun,
            review_hour: 20,
        }
    }

    fn test_state(logs: Arc<MemoryLogStore>) -> AppState {
        let config = Arc::new(test_config());
        let state_store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::default());
        let log_store: Arc<dyn LogStore> = logs;
        let streak = Arc::new(StreakEngine::new(
            log_store.clone(),
            state_store.clone(),
            config.tz(),
        ));
        AppState {
            config,
            logs: log_store,
            state_store,
            streak,
            ai: Arc::new(GeminiClient::new("key", Vec::new())),
            line: Arc::new(LineClient::new("token", "user")),
        }
    }

    fn sign(body: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(body.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    fn request(body: &str, signature: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/line/webhook")
            .header("content-type", "application/json")
            .header("x-line-signature", signature)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn rejects_bad_signature() {
        let logs = Arc::new(MemoryLogStore::default());
        let app = app(test_state(logs.clone()));

        let response = app
            .oneshot(request(r#"{"events":[]}"#, "bogus"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(logs.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn captures_entry_even_when_analysis_fails() {
        let logs = Arc::new(MemoryLogStore::default());
        let state = test_state(logs.clone());
        let app = app(state.clone());

        let body = r#"{"events":[{"type":"message","timestamp":0,"message":{"type":"text","id":"m1","text":"今日は実験がうまくいった"}}]}"#;
        let response = app.oneshot(request(body, &sign(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"ok");

        let entries = logs.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "📝 日記");
        let stored_body = entries[0].body.clone().unwrap();
        assert!(stored_body.contains("AI解析失敗"));
        assert!(stored_body.contains("今日は実験がうまくいった"));
        drop(entries);

        // Capture also advanced the streak.
        let streak: StreakState =
            store::get_json(state.state_store.as_ref(), keys::STREAK_STATE)
                .await
                .unwrap()
                .unwrap();
        assert_eq!(streak.count, 1);
    }

    #[tokio::test]
    async fn image_message_records_a_photo_entry() {
        let logs = Arc::new(MemoryLogStore::default());
        let app = app(test_state(logs.clone()));

        let body = r#"{"events":[{"type":"message","timestamp":0,"message":{"type":"image","id":"img-42"}}]}"#;
        let response = app.oneshot(request(body, &sign(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let entries = logs.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "📷 写真日記");
        assert!(entries[0].body.clone().unwrap().contains("img-42"));
    }

    #[tokio::test]
    async fn non_message_events_are_ignored() {
        let logs = Arc::new(MemoryLogStore::default());
        let app = app(test_state(logs.clone()));

        let body = r#"{"events":[{"type":"follow","timestamp":0}]}"#;
        let response = app.oneshot(request(body, &sign(body))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(logs.entries.lock().unwrap().is_empty());
    }
}
