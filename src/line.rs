//! LINE Messaging API transport. All outbound text is clipped to the
//! per-message limit inside this module, so no call site can forget the
//! guard.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::json;
use sha2::Sha256;

const LINE_API: &str = "https://api.line.me/v2/bot";

/// Hard per-message size limit of the Messaging API, in characters.
pub const MESSAGE_LIMIT: usize = 5000;

pub const TRUNCATION_MARKER: &str = "…(省略)";

/// Clip `text` to at most `limit` characters, appending the truncation
/// marker when anything was cut. Character-based: payloads are Japanese
/// and must never be split mid-codepoint.
pub fn safe_truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if limit <= marker_len {
        return TRUNCATION_MARKER.chars().take(limit).collect();
    }
    let mut out: String = text.chars().take(limit - marker_len).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Verify the `x-line-signature` header: base64 of HMAC-SHA256 over the
/// raw request body, keyed with the channel secret.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
    expected == signature
}

pub struct LineClient {
    client: Client,
    token: String,
    user_id: String,
}

impl LineClient {
    pub fn new(token: &str, user_id: &str) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build http client");
        Self {
            client,
            token: token.to_string(),
            user_id: user_id.to_string(),
        }
    }

    /// Push a message to the configured user.
    pub async fn push(&self, text: &str) -> anyhow::Result<()> {
        let payload = json!({
            "to": self.user_id,
            "messages": [{ "type": "text", "text": safe_truncate(text, MESSAGE_LIMIT) }]
        });
        self.send(&format!("{}/message/push", LINE_API), &payload)
            .await
    }

    /// Reply to a webhook event.
    pub async fn reply(&self, reply_token: &str, text: &str) -> anyhow::Result<()> {
        let payload = json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": safe_truncate(text, MESSAGE_LIMIT) }]
        });
        self.send(&format!("{}/message/reply", LINE_API), &payload)
            .await
    }

    async fn send(&self, url: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(200).collect();
            anyhow::bail!("LINE API error ({}): {}", status, body);
        }
        Ok(())
    }
}
