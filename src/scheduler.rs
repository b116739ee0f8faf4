//! Time-based triggers: daily reminder, weekly review, month-end review.
//! A single in-process worker ticks every minute in local time; each
//! trigger fires at most once per day.

use chrono::{Datelike, NaiveDate, Timelike};

use crate::error::AppResult;
use crate::handlers::reviews;
use crate::services::time;
use crate::AppState;

pub fn spawn_trigger_worker(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        let mut reminder_fired: Option<NaiveDate> = None;
        let mut weekly_fired: Option<NaiveDate> = None;
        let mut monthly_fired: Option<NaiveDate> = None;

        loop {
            ticker.tick().await;
            let now = state.config.now_local();
            let today = now.date_naive();

            if now.hour() == state.config.reminder_hour && reminder_fired != Some(today) {
                reminder_fired = Some(today);
                run_daily_reminder(&state, today).await;
            }

            if now.weekday() == state.config.review_weekday
                && now.hour() == state.config.review_hour
                && weekly_fired != Some(today)
            {
                weekly_fired = Some(today);
                tracing::info!("weekly review trigger fired");
                deliver(
                    &state,
                    reviews::run_weekly_review(&state).await,
                    "週次レビューの生成に失敗しました。",
                )
                .await;
            }

            if time::is_month_end(today)
                && now.hour() == state.config.review_hour
                && monthly_fired != Some(today)
            {
                monthly_fired = Some(today);
                tracing::info!("month-end review trigger fired");
                deliver(
                    &state,
                    reviews::run_monthly_review(&state).await,
                    "月次レビューの生成に失敗しました。",
                )
                .await;
            }
        }
    });
}

async fn run_daily_reminder(state: &AppState, today: NaiveDate) {
    let tz = state.config.tz();
    let (start, end) = time::day_range_utc(today, today, tz);
    match state.logs.query_range(start, end).await {
        Ok(entries) if entries.is_empty() => {
            if let Err(e) = state
                .line
                .push("今日はまだ日記がありません。一言だけでも記録してみませんか？📓")
                .await
            {
                tracing::warn!(error = %e, "reminder delivery failed");
            }
        }
        Ok(_) => {}
        Err(e) => {
            // Skip the reminder rather than nag on flaky data.
            tracing::warn!(error = %e, "reminder entry check failed");
        }
    }
}

async fn deliver(state: &AppState, result: AppResult<String>, failure_note: &str) {
    let text = match result {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "scheduled review generation failed");
            format!("{}\n{}", failure_note, e)
        }
    };
    if let Err(e) = state.line.push(&text).await {
        tracing::error!(error = %e, "scheduled delivery failed");
    }
}
