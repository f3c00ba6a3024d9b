use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::validators::truncate_chars,
    domain::entities::analytics::{
        AnalyticsEventKind, DEFAULT_ANALYTICS_DAYS, DailyCount, DailyStat, MAX_ANALYTICS_DAYS,
        click_through_rate, fill_daily_series, window_start,
    },
    use_cases::{admin::SettingsRepo, user::UserRepo},
};

pub const MAX_REFERRER_LEN: usize = 255;
pub const TOP_LINKS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnalyticsEvent {
    pub user_id: Uuid,
    pub kind: AnalyticsEventKind,
    pub link_id: Option<Uuid>,
    pub referrer: Option<String>,
}

impl NewAnalyticsEvent {
    pub fn new(
        user_id: Uuid,
        kind: AnalyticsEventKind,
        link_id: Option<Uuid>,
        referrer: Option<&str>,
    ) -> Self {
        Self {
            user_id,
            kind,
            link_id,
            referrer: referrer
                .map(|r| truncate_chars(r, MAX_REFERRER_LEN))
                .filter(|r| !r.is_empty()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkClicks {
    pub link_id: Uuid,
    pub title: String,
    pub clicks: i64,
}

#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    async fn record_event(&self, event: &NewAnalyticsEvent) -> AppResult<()>;

    /// Events per UTC day and kind since `since` (inclusive).
    async fn daily_counts(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>>;

    /// Click events per link since `since`, for links that still exist.
    async fn link_clicks(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<LinkClicks>>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsTotals {
    pub views: i64,
    pub clicks: i64,
    pub click_through_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsSummary {
    pub days: i32,
    /// Set when a free account asked for more history than it gets.
    pub capped: bool,
    pub totals: AnalyticsTotals,
    pub daily: Vec<DailyStat>,
    pub top_links: Vec<LinkClicks>,
}

/// Most clicked first, ties by title, at most `TOP_LINKS`.
pub fn top_links(mut links: Vec<LinkClicks>) -> Vec<LinkClicks> {
    links.sort_by(|a, b| b.clicks.cmp(&a.clicks).then_with(|| a.title.cmp(&b.title)));
    links.truncate(TOP_LINKS);
    links
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct AnalyticsUseCases {
    repo: Arc<dyn AnalyticsRepo>,
    users: Arc<dyn UserRepo>,
    settings: Arc<dyn SettingsRepo>,
}

impl AnalyticsUseCases {
    pub fn new(
        repo: Arc<dyn AnalyticsRepo>,
        users: Arc<dyn UserRepo>,
        settings: Arc<dyn SettingsRepo>,
    ) -> Self {
        Self {
            repo,
            users,
            settings,
        }
    }

    /// Records a page view. Failures are logged, never returned: a broken
    /// analytics table must not take public pages down.
    pub async fn record_page_view(&self, user_id: Uuid, referrer: Option<&str>) {
        let event =
            NewAnalyticsEvent::new(user_id, AnalyticsEventKind::PageView, None, referrer);
        if let Err(e) = self.repo.record_event(&event).await {
            tracing::warn!(error = %e, %user_id, "Failed to record page view");
        }
    }

    #[instrument(skip(self))]
    pub async fn summary(&self, user_id: Uuid, days: Option<i32>) -> AppResult<AnalyticsSummary> {
        let requested = days.unwrap_or(DEFAULT_ANALYTICS_DAYS);
        if !(1..=MAX_ANALYTICS_DAYS).contains(&requested) {
            return Err(AppError::InvalidInput(format!(
                "days must be between 1 and {MAX_ANALYTICS_DAYS}"
            )));
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let days = if user.is_premium() {
            requested
        } else {
            let cap = self.settings.get_settings().await?.analytics_days_free;
            requested.min(cap.max(1))
        };

        let today = Utc::now().date_naive();
        let since = start_of_day(window_start(today, days));

        let counts = self.repo.daily_counts(user_id, since).await?;
        let daily = fill_daily_series(today, days, &counts);

        let views: i64 = daily.iter().map(|d| d.views).sum();
        let clicks: i64 = daily.iter().map(|d| d.clicks).sum();

        let links = self.repo.link_clicks(user_id, since).await?;

        Ok(AnalyticsSummary {
            days,
            capped: days < requested,
            totals: AnalyticsTotals {
                views,
                clicks,
                click_through_rate: click_through_rate(views, clicks),
            },
            daily,
            top_links: top_links(links),
        })
    }
}
