//! Interactive query commands, dispatched from `/`-prefixed webhook text.
//! Failures never surface raw errors to the chat: the user gets a short
//! notice plus the command menu.

use chrono::{Datelike, Duration, NaiveDate};
use rand::Rng;

use crate::error::AppResult;
use crate::handlers::reviews;
use crate::services::{stats, time};
use crate::AppState;

pub const COMMAND_MARKER: char = '/';

/// How far back `/onthisday` looks.
const ON_THIS_DAY_YEARS: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Today,
    Yesterday,
    Stats,
    Streak,
    Review,
    Monthly,
    OnThisDay,
    Random,
    Help,
}

impl Command {
    pub fn parse(input: &str) -> Option<Command> {
        match input.trim().to_ascii_lowercase().as_str() {
            "today" => Some(Command::Today),
            "yesterday" => Some(Command::Yesterday),
            "stats" => Some(Command::Stats),
            "streak" => Some(Command::Streak),
            "review" => Some(Command::Review),
            "monthly" => Some(Command::Monthly),
            "onthisday" | "on-this-day" => Some(Command::OnThisDay),
            "random" => Some(Command::Random),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

pub async fn dispatch(state: &AppState, input: &str) -> String {
    let Some(command) = Command::parse(input) else {
        return format!(
            "コマンドが見つかりません: {}\n\n{}",
            input.trim(),
            help_text()
        );
    };

    let result = match command {
        Command::Today => list_day(state, state.config.today_local(), "本日").await,
        Command::Yesterday => {
            list_day(state, state.config.today_local() - Duration::days(1), "昨日").await
        }
        Command::Stats => monthly_stats(state).await,
        Command::Streak => streak(state).await,
        Command::Review => reviews::run_weekly_review(state).await,
        Command::Monthly => reviews::run_monthly_review(state).await,
        Command::OnThisDay => on_this_day(state).await,
        Command::Random => random_recall(state).await,
        Command::Help => Ok(help_text()),
    };

    match result {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, command = ?command, "command failed");
            format!("⚠️ エラーが発生しました。\n\n{}", help_text())
        }
    }
}

async fn list_day(state: &AppState, day: NaiveDate, label: &str) -> AppResult<String> {
    let tz = state.config.tz();
    let (start, end) = time::day_range_utc(day, day, tz);
    let entries = state.logs.query_range(start, end).await?;

    if entries.is_empty() {
        return Ok(format!("{}の記録はまだありません。📓", label));
    }

    let mut out = format!("{}の記録 ({}件)\n", label, entries.len());
    for entry in &entries {
        out.push_str(&format!(
            "・{} {} {} [{}]\n",
            entry.created_at.with_timezone(&tz).format("%H:%M"),
            entry.mood_label(),
            entry.title,
            entry.tag_labels(),
        ));
    }
    Ok(out.trim_end().to_string())
}

async fn monthly_stats(state: &AppState) -> AppResult<String> {
    let tz = state.config.tz();
    let today = state.config.today_local();
    let start_day = today - Duration::days(29);
    let (start, end) = time::day_range_utc(start_day, today, tz);
    let entries = state.logs.query_range(start, end).await?;
    let stats = stats::aggregate(&entries, tz);

    Ok(format!("📊 直近30日の統計\n{}", stats.render(Some(5))))
}

async fn streak(state: &AppState) -> AppResult<String> {
    let today = state.config.today_local();
    let snapshot = state.streak.query(today).await?;

    if snapshot.count == 0 {
        return Ok("記録が途切れています。今日の記録から再スタートしましょう！📓".into());
    }

    let mut out = format!("🔥 連続{}日目", snapshot.count);
    if let Some(start) = snapshot.start_date {
        out.push_str(&format!(" ({}〜)", start));
    }
    if !snapshot.has_today_record {
        out.push_str("\n今日はまだ記録がありません。");
    }
    Ok(out)
}

async fn on_this_day(state: &AppState) -> AppResult<String> {
    let tz = state.config.tz();
    let today = state.config.today_local();
    let mut out = String::from("🕰️ この日の思い出\n");
    let mut found = 0;

    for years_back in 1..=ON_THIS_DAY_YEARS {
        // Feb 29 simply has no match in non-leap years.
        let Some(day) =
            NaiveDate::from_ymd_opt(today.year() - years_back, today.month(), today.day())
        else {
            continue;
        };
        let (start, end) = time::day_range_utc(day, day, tz);
        let entries = state.logs.query_range(start, end).await?;
        for entry in &entries {
            out.push_str(&format!(
                "・{}年前 [{}] {} {}\n",
                years_back,
                day,
                entry.mood_label(),
                entry.title,
            ));
            found += 1;
        }
    }

    if found == 0 {
        return Ok("過去の同じ日の記録はありませんでした。📓".into());
    }
    Ok(out.trim_end().to_string())
}

async fn random_recall(state: &AppState) -> AppResult<String> {
    let tz = state.config.tz();
    let ids = state.logs.list_ids_and_dates().await?;
    if ids.is_empty() {
        return Ok("まだ記録がありません。📓".into());
    }

    // Uniform over entries, not days: days with many entries weigh more.
    let index = rand::thread_rng().gen_range(0..ids.len());
    let (id, _) = &ids[index];
    let entry = state.logs.fetch_entry(id).await?;
    let body = state.logs.fetch_body(id).await?;

    let mut out = format!(
        "🎲 ランダム回想\n[{}] {} {} [{}]",
        entry.local_date(tz),
        entry.mood_label(),
        entry.title,
        entry.tag_labels(),
    );
    if !body.trim().is_empty() {
        out.push('\n');
        out.push_str(body.trim_end());
    }
    Ok(out)
}

pub fn help_text() -> String {
    [
        "📖 コマンド一覧",
        "/today 今日の記録",
        "/yesterday 昨日の記録",
        "/stats 直近30日の統計",
        "/streak 連続記録日数",
        "/review 週次レビューを生成",
        "/monthly 月次レビューを生成",
        "/onthisday 過去の同じ日の記録",
        "/random ランダムに1件振り返る",
        "/help このメニュー",
    ]
    .join("\n")
}
