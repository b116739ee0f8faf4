//! Calendar helpers. All day-level logic (streaks, unique days, weekday
//! buckets) runs in the configured local offset, not UTC.

use chrono::{DateTime, Datelike, Duration, FixedOffset, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

pub const WEEKDAY_LABELS_JA: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// The UTC instant at which `day` begins in `tz`.
pub fn day_start_utc(day: NaiveDate, tz: FixedOffset) -> DateTime<Utc> {
    let naive = day.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        // A fixed offset never produces ambiguous or missing local times.
        _ => DateTime::from_naive_utc_and_offset(naive, Utc),
    }
}

/// Half-open UTC range covering the local days `first..=last`.
pub fn day_range_utc(
    first: NaiveDate,
    last: NaiveDate,
    tz: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    (
        day_start_utc(first, tz),
        day_start_utc(last + Duration::days(1), tz),
    )
}

pub fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

pub fn month_end(day: NaiveDate) -> NaiveDate {
    let next = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    };
    next.map(|d| d - Duration::days(1)).unwrap_or(day)
}

pub fn is_month_end(day: NaiveDate) -> bool {
    day == month_end(day)
}

pub fn month_label_ja(day: NaiveDate) -> String {
    format!("{}年{}月", day.year(), day.month())
}
