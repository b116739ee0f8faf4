//! Prompt assembly for weekly and monthly reviews, plus the rolling
//! weekly-review history buffer that feeds the monthly roll-up.
//!
//! Composition is deterministic concatenation in a fixed section order.
//! No length cap is applied here; the transport applies its own hard
//! limit on delivery, and stored review texts are clipped by the caller.

use chrono::{Duration, FixedOffset, NaiveDate};

use crate::models::entry::LogEntry;
use crate::models::review::{ReviewHistoryEntry, REVIEW_HISTORY_CAPACITY};
use crate::services::stats::AggregateStats;

const WEEKLY_PREAMBLE: &str = r#"あなたはユーザーの成長を見守る「信頼できるメンター」です。
厳しさと優しさを兼ね備え、ユーザーが「また来週も頑張ろう」と思える週次レビューを作成してください。

【📝 出力ルール】
- 全体で400〜600文字程度（LINEで読みやすい長さ）
- Markdown記法（**太字**など）は使用禁止
- 見出しは【 】と絵文字で表現
- ポジティブ7割、改善提案3割のバランスで
- ユーザー情報は参考にとどめ、本文でそのまま繰り返さないこと

【📊 レビュー構成】
1. 💪 今週のハイライト
   - 最も印象的だった出来事や成長を1〜2個ピックアップ
   - 「できた事実」を具体的に言語化して自己効力感を高める

2. 🔋 心身のバランスチェック
   - 気分の推移パターンを読み取る（上昇傾向？波がある？）
   - 活動量とリカバリーのバランスについて一言

3. 🎯 来週へのワンポイント
   - 今週の傾向から、来週試してほしい「小さな実験」を1つだけ提案
   - 抽象的なアドバイスではなく、すぐ実行できる具体的なアクションで
"#;

const WEEKLY_EXAMPLE: &str = r#"【✍️ 出力例(形式の参考)】
【💪 今週のハイライト】
水曜日の実験がうまくいったのは大きな一歩でした。…
【🔋 心身のバランスチェック】
週の後半にかけて気分が上向いています。…
【🎯 来週へのワンポイント】
寝る前の5分だけ、明日の最初の一手をメモしてみましょう。
"#;

const MONTHLY_PREAMBLE: &str = r#"あなたはユーザーの成長を見守る「信頼できるメンター」です。
1ヶ月を俯瞰し、週単位では見えない変化や積み重ねを言語化する月次レビューを作成してください。

【📝 出力ルール】
- 全体で500〜800文字程度
- Markdown記法（**太字**など）は使用禁止
- 見出しは【 】と絵文字で表現
- 週次レビューを主な材料とし、日記メタデータと終盤の日記全文で補完すること
- ユーザー情報は参考にとどめ、本文でそのまま繰り返さないこと

【📊 レビュー構成】
1. 🏔️ 今月の歩み（大きな流れと転機）
2. 📈 先月からの変化（前回の月次レビューとの比較）
3. 🎯 来月のテーマ（1つだけ、具体的に）
"#;

/// Weekly review prompt: persona → profile → prior review (continuity) →
/// stats → worked example → full entry blocks.
pub fn compose_weekly_prompt(
    profile: &str,
    prior_review: Option<&str>,
    stats: &AggregateStats,
    entries: &[LogEntry],
    tz: FixedOffset,
) -> String {
    let mut prompt = String::from(WEEKLY_PREAMBLE);

    prompt.push_str("\n【👤 ユーザー情報】\n");
    prompt.push_str(profile);
    prompt.push('\n');

    if let Some(prior) = prior_review.filter(|p| !p.trim().is_empty()) {
        prompt.push_str("\n【🔁 前回の週次レビュー(話の継続性の参考に)】\n");
        prompt.push_str(prior);
        prompt.push('\n');
    }

    prompt.push_str("\n【📊 今週の統計】\n");
    prompt.push_str(&stats.summary_text());
    prompt.push('\n');

    prompt.push('\n');
    prompt.push_str(WEEKLY_EXAMPLE);

    prompt.push_str("\n【日記ログ】\n");
    for entry in entries {
        prompt.push_str(&entry_block(entry, tz));
    }

    prompt
}

/// Monthly review prompt. Weekly reviews are the primary evidence;
/// metadata-only entries are secondary context; `supplemental` carries
/// full bodies for the days after the last weekly review, which no weekly
/// summary covers.
#[allow(clippy::too_many_arguments)]
pub fn compose_monthly_prompt(
    profile: &str,
    weekly_history: &[ReviewHistoryEntry],
    prior_monthly: Option<&str>,
    stats: &AggregateStats,
    meta_entries: &[LogEntry],
    month_label: &str,
    supplemental: &[LogEntry],
    tz: FixedOffset,
) -> String {
    let mut prompt = String::from(MONTHLY_PREAMBLE);

    prompt.push_str(&format!("\n【🗓️ 対象月】\n{}\n", month_label));

    prompt.push_str("\n【👤 ユーザー情報】\n");
    prompt.push_str(profile);
    prompt.push('\n');

    if !weekly_history.is_empty() {
        prompt.push_str("\n【📅 今月の週次レビュー(主要な振り返り材料)】\n");
        for review in weekly_history {
            prompt.push_str(&format!("▼ {}\n{}\n", review.date, review.text));
        }
    }

    if let Some(prior) = prior_monthly.filter(|p| !p.trim().is_empty()) {
        prompt.push_str("\n【🔁 前回の月次レビュー(話の継続性の参考に)】\n");
        prompt.push_str(prior);
        prompt.push('\n');
    }

    prompt.push_str("\n【📊 今月の統計】\n");
    prompt.push_str(&stats.summary_text());
    prompt.push('\n');

    if !meta_entries.is_empty() {
        prompt.push_str("\n【📝 今月の記録(メタデータ)】\n");
        for entry in meta_entries {
            prompt.push_str(&format!(
                "[{}] 気分:{} タグ:{} タイトル:{}\n",
                entry.local_date(tz),
                entry.mood_label(),
                entry.tag_labels(),
                entry.title,
            ));
        }
    }

    if !supplemental.is_empty() {
        prompt.push_str("\n【🔍 最後の週次レビュー以降の日記(全文)】\n");
        for entry in supplemental {
            prompt.push_str(&entry_block(entry, tz));
        }
    }

    prompt
}

fn entry_block(entry: &LogEntry, tz: FixedOffset) -> String {
    let mut block = format!(
        "[{}] 気分:{} タグ:{} タイトル:{}\n",
        entry.local_date(tz),
        entry.mood_label(),
        entry.tag_labels(),
        entry.title,
    );
    if let Some(body) = entry.body.as_deref().filter(|b| !b.trim().is_empty()) {
        block.push_str(body.trim_end());
        block.push('\n');
    }
    block
}

/// Days the monthly review must cover with full entry bodies: strictly
/// after the latest weekly review's date, through month end. No weekly
/// history means nothing to supplement against.
pub fn supplemental_window(
    history: &[ReviewHistoryEntry],
    month_end: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let latest = history.iter().map(|h| h.date).max()?;
    if latest >= month_end {
        return None;
    }
    Some((latest + Duration::days(1), month_end))
}

/// Ring-buffer append with FIFO eviction beyond capacity.
pub fn append_review_to_history(
    mut history: Vec<ReviewHistoryEntry>,
    entry: ReviewHistoryEntry,
) -> Vec<ReviewHistoryEntry> {
    history.push(entry);
    while history.len() > REVIEW_HISTORY_CAPACITY {
        history.remove(0);
    }
    history
}

/// Inclusive-bounds date filter. A weekly review dated near month-start
/// may describe days from the prior month; this attribution is
/// best-effort by design of the stored shape.
pub fn filter_history_by_month(
    history: &[ReviewHistoryEntry],
    month_start: NaiveDate,
    month_end: NaiveDate,
) -> Vec<ReviewHistoryEntry> {
    history
        .iter()
        .filter(|h| h.date >= month_start && h.date <= month_end)
        .cloned()
        .collect()
}
