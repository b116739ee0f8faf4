//! Weekly and monthly review orchestration: fetch → aggregate → compose →
//! generate → persist. Shared by the chat commands, the scheduler, and
//! the manual trigger endpoints.

use axum::{extract::State, Json};
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::line;
use crate::models::entry::LogEntry;
use crate::models::review::{ReviewHistoryEntry, STORED_REVIEW_TEXT_LIMIT};
use crate::services::review::{
    append_review_to_history, compose_monthly_prompt, compose_weekly_prompt,
    filter_history_by_month, supplemental_window,
};
use crate::services::{stats, time};
use crate::store::{self, keys, StoreResult};
use crate::AppState;

/// Generate this week's review over the last 7 local days. Returns the
/// deliverable text; zero entries short-circuits with a fixed message
/// instead of an AI call.
pub async fn run_weekly_review(state: &AppState) -> AppResult<String> {
    let tz = state.config.tz();
    let today = state.config.today_local();
    let start_day = today - Duration::days(6);
    let (start, end) = time::day_range_utc(start_day, today, tz);
    let entries = state.logs.query_range(start, end).await?;

    if entries.is_empty() {
        return Ok("今週は日記の記録がありませんでした。来週は記録してみましょう！📓".into());
    }

    let stats = stats::aggregate(&entries, tz);
    let prior = state.state_store.get(keys::LAST_WEEKLY_REVIEW).await?;
    let prompt = compose_weekly_prompt(
        &state.config.user_profile,
        prior.as_deref(),
        &stats,
        &entries,
        tz,
    );

    let review = state.ai.generate_review(&prompt).await?;

    if let Err(e) = persist_weekly(state, today, &review).await {
        // The review was generated; a failed bookkeeping write costs
        // continuity for the next review, not this delivery.
        tracing::warn!(error = %e, "failed to persist weekly review state");
    }

    Ok(format!("📅 【週次レビュー】\n\n{}", review))
}

async fn persist_weekly(state: &AppState, date: NaiveDate, review: &str) -> StoreResult<()> {
    let stored = line::safe_truncate(review, STORED_REVIEW_TEXT_LIMIT);
    state
        .state_store
        .set(keys::LAST_WEEKLY_REVIEW, &stored)
        .await?;

    let history: Vec<ReviewHistoryEntry> =
        store::get_json(state.state_store.as_ref(), keys::WEEKLY_HISTORY)
            .await?
            .unwrap_or_default();
    let history = append_review_to_history(
        history,
        ReviewHistoryEntry {
            date,
            text: stored,
        },
    );
    store::set_json(state.state_store.as_ref(), keys::WEEKLY_HISTORY, &history).await
}

/// Generate the current month's review. Weekly reviews are the primary
/// input; days after the last weekly review are re-fetched with full
/// bodies since no weekly summary covers them.
pub async fn run_monthly_review(state: &AppState) -> AppResult<String> {
    let tz = state.config.tz();
    let today = state.config.today_local();
    let month_start = time::month_start(today);
    let month_end = time::month_end(today);
    let (start, end) = time::day_range_utc(month_start, month_end, tz);
    let meta_entries = state.logs.query_range(start, end).await?;

    let history: Vec<ReviewHistoryEntry> =
        store::get_json(state.state_store.as_ref(), keys::WEEKLY_HISTORY)
            .await?
            .unwrap_or_default();
    let month_history = filter_history_by_month(&history, month_start, month_end);

    if meta_entries.is_empty() && month_history.is_empty() {
        return Ok("今月は振り返る記録がありませんでした。来月は記録してみましょう！📓".into());
    }

    let supplemental = match supplemental_window(&month_history, month_end) {
        Some((from, to)) => fetch_supplemental(state, &meta_entries, from, to).await?,
        None => Vec::new(),
    };

    let stats = stats::aggregate(&meta_entries, tz);
    let prior = state.state_store.get(keys::LAST_MONTHLY_REVIEW).await?;
    let prompt = compose_monthly_prompt(
        &state.config.user_profile,
        &month_history,
        prior.as_deref(),
        &stats,
        &meta_entries,
        &time::month_label_ja(today),
        &supplemental,
        tz,
    );

    let review = state.ai.generate_review(&prompt).await?;

    let stored = line::safe_truncate(&review, STORED_REVIEW_TEXT_LIMIT);
    if let Err(e) = state
        .state_store
        .set(keys::LAST_MONTHLY_REVIEW, &stored)
        .await
    {
        tracing::warn!(error = %e, "failed to persist monthly review state");
    }

    Ok(format!("🗓️ 【月次レビュー】\n\n{}", review))
}

/// Full-body fetch for entries in `[from, to]`. A fetch failure is fatal
/// for this review attempt — no partial review is sent.
async fn fetch_supplemental(
    state: &AppState,
    meta_entries: &[LogEntry],
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<LogEntry>> {
    let tz = state.config.tz();
    let mut out = Vec::new();
    for entry in meta_entries {
        let day = entry.local_date(tz);
        if day >= from && day <= to {
            let body = state.logs.fetch_body(&entry.id).await?;
            let mut full = entry.clone();
            full.body = Some(body);
            out.push(full);
        }
    }
    Ok(out)
}

pub async fn trigger_weekly(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let text = run_weekly_review(&state).await?;
    state.line.push(&text).await.map_err(AppError::Internal)?;
    Ok(Json(json!({ "delivered": true })))
}

pub async fn trigger_monthly(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let text = run_monthly_review(&state).await?;
    state.line.push(&text).await.map_err(AppError::Internal)?;
    Ok(Json(json!({ "delivered": true })))
}
