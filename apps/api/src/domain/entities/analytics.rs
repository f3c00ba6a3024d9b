use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

pub const MAX_ANALYTICS_DAYS: i32 = 90;
pub const DEFAULT_ANALYTICS_DAYS: i32 = 30;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnalyticsEventKind {
    PageView,
    LinkClick,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStat {
    pub date: NaiveDate,
    pub views: i64,
    pub clicks: i64,
}

/// One aggregated row from storage: events of `kind` on `date`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub kind: AnalyticsEventKind,
    pub count: i64,
}

/// First day of a window of `days` days ending at `today` (inclusive).
pub fn window_start(today: NaiveDate, days: i32) -> NaiveDate {
    let back = u64::try_from(days.max(1) - 1).unwrap_or(0);
    today.checked_sub_days(Days::new(back)).unwrap_or(today)
}

/// Dense, zero-filled series of exactly `days` entries ending at `today`,
/// oldest first. Counts outside the window are ignored.
pub fn fill_daily_series(today: NaiveDate, days: i32, counts: &[DailyCount]) -> Vec<DailyStat> {
    let start = window_start(today, days);

    let mut by_date: HashMap<NaiveDate, (i64, i64)> = HashMap::new();
    for c in counts {
        let entry = by_date.entry(c.date).or_default();
        match c.kind {
            AnalyticsEventKind::PageView => entry.0 += c.count,
            AnalyticsEventKind::LinkClick => entry.1 += c.count,
        }
    }

    start
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|date| {
            let (views, clicks) = by_date.get(&date).copied().unwrap_or_default();
            DailyStat {
                date,
                views,
                clicks,
            }
        })
        .collect()
}

/// Clicks per view, rounded to 4 decimals; 0 when there were no views.
pub fn click_through_rate(views: i64, clicks: i64) -> f64 {
    if views <= 0 {
        return 0.0;
    }
    let ratio = clicks as f64 / views as f64;
    (ratio * 10_000.0).round() / 10_000.0
}
