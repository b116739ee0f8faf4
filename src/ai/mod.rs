//! AI enrichment and review generation. Every call runs through
//! [`with_fallbacks`], the single retry policy in the system: try each
//! model candidate in priority order and only fail once all of them have.

pub mod gemini;

pub use gemini::GeminiClient;

use std::future::Future;

/// Aggregated failure across the whole candidate list. `details` carries
/// one `[model] message` line per attempt.
#[derive(Debug, thiserror::Error)]
#[error("all model candidates failed:\n{details}")]
pub struct FallbackError {
    pub details: String,
}

/// Attempt `attempt` against each candidate in order, returning the first
/// success. Failures are accumulated and only surface together when every
/// candidate has failed.
pub async fn with_fallbacks<'a, T, F, Fut>(
    candidates: &'a [String],
    mut attempt: F,
) -> Result<T, FallbackError>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut details = Vec::new();
    for candidate in candidates {
        match attempt(candidate).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(model = %candidate, error = %e, "model candidate failed");
                details.push(format!("[{}] {}", candidate, e));
            }
        }
    }
    if details.is_empty() {
        details.push("no model candidates configured".to_string());
    }
    Err(FallbackError {
        details: details.join("\n"),
    })
}
