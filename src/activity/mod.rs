//! UTC-day commit bucketing and the activity/streak classifier.
//!
//! Everything here is pure date arithmetic over already-fetched commit
//! timestamps. The GitHub client hands in `DateTime<Utc>` instants; this
//! module turns them into a fixed-width daily histogram and derives the
//! "active"/"abandoned" status and the trailing-day streak from it.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Inactivity threshold: a repo whose newest commit is this many whole days
/// old (or whose last commit is unknown) is classified as abandoned.
pub const ABANDONED_AFTER_DAYS: i64 = 3;

/// How far back the streak walk looks, in days.
pub const STREAK_LOOKBACK_DAYS: u32 = 14;

/// Largest accepted histogram window.
pub const MAX_WINDOW_DAYS: u32 = 31;

/// Window used when the caller supplies no usable day count.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

// ─── Window ──────────────────────────────────────────────────────────────────

/// A closed UTC calendar window of `days` days ending on `today`.
///
/// `since` is 00:00:00.000 UTC on the first day, `until` 23:59:59.999 UTC on
/// the last. Both bounds are inclusive; membership is decided by whole-day
/// truncation, never sub-day instant comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub days: u32,
}

impl DayWindow {
    /// Window of `days` days ending on the given calendar day.
    pub fn ending(today: NaiveDate, days: u32) -> Self {
        let days = days.clamp(1, MAX_WINDOW_DAYS);
        let first = today - Days::new(u64::from(days) - 1);
        let since = first.and_time(chrono::NaiveTime::MIN).and_utc();
        let until =
            today.and_time(chrono::NaiveTime::MIN).and_utc() + Duration::days(1) - Duration::milliseconds(1);
        Self { since, until, days }
    }

    /// Window of `days` days ending today (UTC).
    pub fn ending_today(days: u32) -> Self {
        Self::ending(Utc::now().date_naive(), days)
    }

    /// First calendar day of the window.
    pub fn first_day(&self) -> NaiveDate {
        self.since.date_naive()
    }

    /// Last calendar day of the window.
    pub fn last_day(&self) -> NaiveDate {
        self.until.date_naive()
    }
}

/// Resolve a raw `days` query value: default 7 when absent, unparseable or
/// non-positive; capped at 31.
pub fn clamp_days(raw: Option<&str>) -> u32 {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(n) if n > 0 => n.min(i64::from(MAX_WINDOW_DAYS)) as u32,
        _ => DEFAULT_WINDOW_DAYS,
    }
}

// ─── Buckets ─────────────────────────────────────────────────────────────────

/// One `{date, count}` histogram entry. `date` is the UTC calendar day in
/// "YYYY-MM-DD" form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: String,
    pub count: u64,
}

/// Bucket commit instants into exactly `window.days` daily counts.
///
/// Buckets are pre-seeded to zero for every day of the window, so the output
/// always has one entry per day in chronological order regardless of input.
/// Instants whose UTC day falls outside the window are silently dropped.
pub fn bucket_daily(window: &DayWindow, timestamps: &[DateTime<Utc>]) -> Vec<DailyBucket> {
    let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut cursor = window.first_day();
    for _ in 0..window.days {
        buckets.insert(cursor, 0);
        cursor = cursor + Days::new(1);
    }

    for ts in timestamps {
        let day = ts.date_naive();
        if let Some(count) = buckets.get_mut(&day) {
            *count += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(date, count)| DailyBucket {
            date: date.format("%Y-%m-%d").to_string(),
            count,
        })
        .collect()
}

/// The all-zero histogram for a window — the fallback when the upstream
/// fetch fails.
pub fn empty_buckets(window: &DayWindow) -> Vec<DailyBucket> {
    bucket_daily(window, &[])
}

// ─── Classification ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Abandoned,
}

impl std::fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityStatus::Active => f.write_str("active"),
            ActivityStatus::Abandoned => f.write_str("abandoned"),
        }
    }
}

/// Whole days elapsed since the last known commit, or `None` when no commit
/// instant is known. Negative durations (future-dated commits) floor to 0.
pub fn inactivity_days(now: DateTime<Utc>, last_commit: Option<DateTime<Utc>>) -> Option<i64> {
    last_commit.map(|last| (now - last).num_days().max(0))
}

/// Abandoned at `ABANDONED_AFTER_DAYS` or more whole days of inactivity, and
/// when no commit instant is known at all.
pub fn classify(now: DateTime<Utc>, last_commit: Option<DateTime<Utc>>) -> ActivityStatus {
    match inactivity_days(now, last_commit) {
        Some(days) if days < ABANDONED_AFTER_DAYS => ActivityStatus::Active,
        _ => ActivityStatus::Abandoned,
    }
}

/// Consecutive trailing days (from `today` backward, up to 14) with at least
/// one commit. Days missing from the histogram count as zero; the walk stops
/// at the first zero day.
pub fn streak(today: NaiveDate, buckets: &[DailyBucket]) -> u32 {
    let by_date: BTreeMap<&str, u64> = buckets
        .iter()
        .map(|b| (b.date.as_str(), b.count))
        .collect();

    let mut streak = 0;
    for i in 0..STREAK_LOOKBACK_DAYS {
        let day = today - Days::new(u64::from(i));
        let key = day.format("%Y-%m-%d").to_string();
        if by_date.get(key.as_str()).copied().unwrap_or(0) > 0 {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Human-readable recency: "today", "1 day ago", "{n} days ago", or
/// "unknown" when no commit instant exists.
pub fn describe_recency(now: DateTime<Utc>, last_commit: Option<DateTime<Utc>>) -> String {
    match inactivity_days(now, last_commit) {
        None => "unknown".to_string(),
        Some(0) => "today".to_string(),
        Some(1) => "1 day ago".to_string(),
        Some(n) => format!("{n} days ago"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn window_covers_exactly_n_days() {
        let w = DayWindow::ending(day("2026-08-29"), 7);
        assert_eq!(w.first_day(), day("2026-08-23"));
        assert_eq!(w.last_day(), day("2026-08-29"));
        assert_eq!(w.since, at("2026-08-23T00:00:00Z"));
        assert_eq!(w.until, at("2026-08-29T23:59:59.999Z"));
    }

    #[test]
    fn window_of_one_day_is_today_only() {
        let w = DayWindow::ending(day("2026-08-29"), 1);
        assert_eq!(w.first_day(), day("2026-08-29"));
        assert_eq!(w.last_day(), day("2026-08-29"));
    }

    #[test]
    fn clamp_days_defaults_and_caps() {
        assert_eq!(clamp_days(None), 7);
        assert_eq!(clamp_days(Some("")), 7);
        assert_eq!(clamp_days(Some("abc")), 7);
        assert_eq!(clamp_days(Some("0")), 7);
        assert_eq!(clamp_days(Some("-4")), 7);
        assert_eq!(clamp_days(Some("1")), 1);
        assert_eq!(clamp_days(Some("31")), 31);
        assert_eq!(clamp_days(Some("99")), 31);
    }

    #[test]
    fn buckets_are_zero_seeded_and_ordered() {
        let w = DayWindow::ending(day("2026-08-29"), 3);
        let out = bucket_daily(&w, &[]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].date, "2026-08-27");
        assert_eq!(out[1].date, "2026-08-28");
        assert_eq!(out[2].date, "2026-08-29");
        assert!(out.iter().all(|b| b.count == 0));
    }

    #[test]
    fn buckets_count_in_window_commits_only() {
        let w = DayWindow::ending(day("2026-08-29"), 3);
        let out = bucket_daily(
            &w,
            &[
                at("2026-08-29T09:15:00Z"),
                at("2026-08-29T23:59:59Z"),
                at("2026-08-27T00:00:00Z"),
                // Outside the window — dropped.
                at("2026-08-26T23:59:59Z"),
                at("2026-09-01T00:00:00Z"),
            ],
        );
        assert_eq!(out[0].count, 1);
        assert_eq!(out[1].count, 0);
        assert_eq!(out[2].count, 2);
        let total: u64 = out.iter().map(|b| b.count).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn boundary_instants_are_included() {
        // Membership is by whole-day truncation: both window edges count.
        let w = DayWindow::ending(day("2026-08-29"), 2);
        let out = bucket_daily(
            &w,
            &[at("2026-08-28T00:00:00Z"), at("2026-08-29T23:59:59.999Z")],
        );
        assert_eq!(out[0].count, 1);
        assert_eq!(out[1].count, 1);
    }

    #[test]
    fn bucketing_is_idempotent() {
        let w = DayWindow::ending(day("2026-08-29"), 5);
        let ts = vec![at("2026-08-28T12:00:00Z"), at("2026-08-25T01:00:00Z")];
        assert_eq!(bucket_daily(&w, &ts), bucket_daily(&w, &ts));
    }

    #[test]
    fn all_window_sizes_produce_exact_entry_counts() {
        let today = day("2026-08-29");
        for n in 1..=MAX_WINDOW_DAYS {
            let w = DayWindow::ending(today, n);
            let out = bucket_daily(&w, &[]);
            assert_eq!(out.len(), n as usize);
            // Strictly ascending dates.
            for pair in out.windows(2) {
                assert!(pair[0].date < pair[1].date);
            }
        }
    }

    #[test]
    fn classify_boundary_at_three_days() {
        let now = at("2026-08-29T12:00:00Z");
        let two_days = Some(now - Duration::days(2));
        let three_days = Some(now - Duration::days(3));
        assert_eq!(classify(now, two_days), ActivityStatus::Active);
        assert_eq!(classify(now, three_days), ActivityStatus::Abandoned);
        assert_eq!(classify(now, None), ActivityStatus::Abandoned);
    }

    #[test]
    fn classify_just_under_three_days_is_active() {
        let now = at("2026-08-29T12:00:00Z");
        let last = Some(now - Duration::days(3) + Duration::seconds(1));
        assert_eq!(classify(now, last), ActivityStatus::Active);
    }

    #[test]
    fn streak_stops_at_first_zero_day() {
        let today = day("2026-08-29");
        let buckets = vec![
            DailyBucket { date: "2026-08-26".into(), count: 1 },
            DailyBucket { date: "2026-08-27".into(), count: 0 },
            DailyBucket { date: "2026-08-28".into(), count: 1 },
            DailyBucket { date: "2026-08-29".into(), count: 1 },
        ];
        assert_eq!(streak(today, &buckets), 2);
    }

    #[test]
    fn streak_is_zero_without_a_commit_today() {
        let today = day("2026-08-29");
        let buckets = vec![
            DailyBucket { date: "2026-08-28".into(), count: 5 },
            DailyBucket { date: "2026-08-29".into(), count: 0 },
        ];
        assert_eq!(streak(today, &buckets), 0);
        assert_eq!(streak(today, &[]), 0);
    }

    #[test]
    fn streak_caps_at_lookback() {
        let today = day("2026-08-29");
        let buckets: Vec<DailyBucket> = (0..31)
            .map(|i| DailyBucket {
                date: (today - Days::new(i)).format("%Y-%m-%d").to_string(),
                count: 1,
            })
            .collect();
        assert_eq!(streak(today, &buckets), STREAK_LOOKBACK_DAYS);
    }

    #[test]
    fn recency_wording() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        assert_eq!(describe_recency(now, None), "unknown");
        assert_eq!(describe_recency(now, Some(now - Duration::hours(2))), "today");
        assert_eq!(
            describe_recency(now, Some(now - Duration::days(1))),
            "1 day ago"
        );
        assert_eq!(
            describe_recency(now, Some(now - Duration::days(12))),
            "12 days ago"
        );
    }
}
