//! Statistical aggregation over a list of entries. Pure and ephemeral:
//! recomputed per request, never persisted.

use std::collections::BTreeSet;

use chrono::{Datelike, FixedOffset};

use crate::models::entry::{LogEntry, Mood, Tag};
use crate::services::time::WEEKDAY_LABELS_JA;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStats {
    pub entry_count: usize,
    /// Ranked descending by count; ties keep input encounter order.
    pub mood_counts: Vec<(Mood, u32)>,
    /// Full ranking; callers truncate for presentation.
    pub tag_counts: Vec<(Tag, u32)>,
    /// Monday-first.
    pub weekday_counts: [u32; 7],
    pub unique_days: usize,
}

pub fn aggregate(entries: &[LogEntry], tz: FixedOffset) -> AggregateStats {
    let mut mood_counts: Vec<(Mood, u32)> = Vec::new();
    let mut tag_counts: Vec<(Tag, u32)> = Vec::new();
    let mut weekday_counts = [0u32; 7];
    let mut days = BTreeSet::new();

    for entry in entries {
        if let Some(mood) = entry.mood {
            bump(&mut mood_counts, mood);
        }
        // Tags are not exclusive; the catch-all co-occurring with a
        // specific tag is counted as-is.
        for tag in &entry.tags {
            bump(&mut tag_counts, *tag);
        }
        let date = entry.local_date(tz);
        weekday_counts[date.weekday().num_days_from_monday() as usize] += 1;
        days.insert(date);
    }

    // Stable sort: equal counts retain encounter order.
    mood_counts.sort_by(|a, b| b.1.cmp(&a.1));
    tag_counts.sort_by(|a, b| b.1.cmp(&a.1));

    AggregateStats {
        entry_count: entries.len(),
        mood_counts,
        tag_counts,
        weekday_counts,
        unique_days: days.len(),
    }
}

fn bump<K: PartialEq + Copy>(counts: &mut Vec<(K, u32)>, key: K) {
    if let Some(slot) = counts.iter_mut().find(|(k, _)| *k == key) {
        slot.1 += 1;
    } else {
        counts.push((key, 1));
    }
}

impl AggregateStats {
    pub fn top_tags(&self, limit: usize) -> &[(Tag, u32)] {
        &self.tag_counts[..limit.min(self.tag_counts.len())]
    }

    /// Text rendering shared by the stats command and the review prompts.
    /// `tag_limit` truncates the tag ranking for display; prompts pass
    /// `None` to keep the full ranking.
    pub fn render(&self, tag_limit: Option<usize>) -> String {
        if self.entry_count == 0 {
            return "記録はありません。".to_string();
        }

        let mut out = format!(
            "記録数: {}件 / {}日\n",
            self.entry_count, self.unique_days
        );

        if !self.mood_counts.is_empty() {
            out.push_str("気分: ");
            let moods: Vec<String> = self
                .mood_counts
                .iter()
                .map(|(m, n)| format!("{}×{}", m, n))
                .collect();
            out.push_str(&moods.join(" "));
            out.push('\n');
        }

        let tags = match tag_limit {
            Some(limit) => self.top_tags(limit),
            None => &self.tag_counts,
        };
        if !tags.is_empty() {
            out.push_str("タグ: ");
            let tags: Vec<String> = tags.iter().map(|(t, n)| format!("{}×{}", t, n)).collect();
            out.push_str(&tags.join(" "));
            out.push('\n');
        }

        out.push_str("曜日: ");
        let weekdays: Vec<String> = self
            .weekday_counts
            .iter()
            .enumerate()
            .filter(|(_, n)| **n > 0)
            .map(|(i, n)| format!("{}×{}", WEEKDAY_LABELS_JA[i], n))
            .collect();
        out.push_str(&weekdays.join(" "));
        out
    }

    pub fn summary_text(&self) -> String {
        self.render(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    use crate::services::time;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn entry(date: NaiveDate, mood: Option<Mood>, tags: Vec<Tag>) -> LogEntry {
        LogEntry {
            id: format!("page-{}-{:?}", date, tags),
            created_at: time::day_start_utc(date, jst()) + Duration::hours(9),
            title: "タイトル".into(),
            mood,
            tags,
            body: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[test]
    fn empty_input_yields_empty_stats() {
        let stats = aggregate(&[], jst());
        assert_eq!(stats.entry_count, 0);
        assert!(stats.mood_counts.is_empty());
        assert!(stats.tag_counts.is_empty());
        assert_eq!(stats.unique_days, 0);
        assert_eq!(stats.weekday_counts, [0; 7]);
    }

    #[test]
    fn counts_tags_moods_and_unique_days() {
        let entries = vec![
            entry(day(1), Some(Mood::Happy), vec![Tag::Research]),
            entry(day(2), Some(Mood::Excited), vec![Tag::Meal, Tag::Photo]),
            entry(day(3), Some(Mood::Happy), vec![Tag::Research]),
        ];
        let stats = aggregate(&entries, jst());

        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.unique_days, 3);
        assert_eq!(stats.tag_counts[0], (Tag::Research, 2));
        // Ties keep encounter order: 食事 was seen before 写真.
        assert_eq!(stats.tag_counts[1], (Tag::Meal, 1));
        assert_eq!(stats.tag_counts[2], (Tag::Photo, 1));
        assert_eq!(stats.mood_counts[0], (Mood::Happy, 2));
        assert_eq!(stats.mood_counts[1], (Mood::Excited, 1));
    }

    #[test]
    fn aggregation_is_deterministic() {
        let entries = vec![
            entry(day(1), Some(Mood::Neutral), vec![Tag::Study, Tag::Hobby]),
            entry(day(1), None, vec![Tag::Study]),
            entry(day(5), Some(Mood::Angry), vec![Tag::Workout]),
        ];
        assert_eq!(aggregate(&entries, jst()), aggregate(&entries, jst()));
    }

    #[test]
    fn missing_moods_are_not_counted() {
        let entries = vec![entry(day(1), None, vec![Tag::Other])];
        let stats = aggregate(&entries, jst());
        assert!(stats.mood_counts.is_empty());
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn weekday_buckets_use_local_dates() {
        // 2025-01-06 is a Monday.
        let entries = vec![
            entry(day(6), Some(Mood::Happy), vec![]),
            entry(day(7), Some(Mood::Happy), vec![]),
            entry(day(7), Some(Mood::Happy), vec![]),
        ];
        let stats = aggregate(&entries, jst());
        assert_eq!(stats.weekday_counts[0], 1);
        assert_eq!(stats.weekday_counts[1], 2);
    }

    #[test]
    fn render_truncates_tags_for_display_only() {
        let entries = vec![
            entry(day(1), Some(Mood::Happy), Tag::ALL.to_vec()),
            entry(day(2), Some(Mood::Happy), vec![Tag::Research]),
        ];
        let stats = aggregate(&entries, jst());
        assert_eq!(stats.top_tags(5).len(), 5);
        // The full ranking stays available regardless of display limits.
        assert_eq!(stats.tag_counts.len(), Tag::ALL.len());
        let rendered = stats.render(Some(5));
        assert!(rendered.contains("記録数: 2件 / 2日"));
    }
}
