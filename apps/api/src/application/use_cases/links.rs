use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::validators::normalize_url,
    domain::entities::{
        analytics::AnalyticsEventKind,
        link::{Link, validate_reorder},
    },
    use_cases::{
        admin::SettingsRepo,
        analytics::{AnalyticsRepo, NewAnalyticsEvent},
        user::UserRepo,
    },
};

pub const MAX_TITLE_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct NewLink {
    pub title: String,
    pub url: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkChanges {
    pub title: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
}

/// Every mutation locks the owning user row, so concurrent edits of one
/// user's links are serialized and positions stay `0..n-1`.
#[async_trait]
pub trait LinkRepo: Send + Sync {
    async fn list_links(&self, user_id: Uuid) -> AppResult<Vec<Link>>;

    /// Appends at the end. Fails with `LimitReached` when the user already
    /// has `max_links` links.
    async fn create_link(
        &self,
        user_id: Uuid,
        link: &NewLink,
        max_links: Option<i64>,
    ) -> AppResult<Link>;

    async fn update_link(&self, user_id: Uuid, link_id: Uuid, changes: &LinkChanges)
    -> AppResult<Link>;

    /// Removes the link and shifts the ones after it down by one.
    async fn delete_link(&self, user_id: Uuid, link_id: Uuid) -> AppResult<()>;

    /// Writes `position = index` for each id. Fails with `Conflict` when the
    /// stored id set no longer matches `ids`.
    async fn reorder_links(&self, user_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Link>>;

    /// Active link `link_id` on the page of `username`.
    async fn find_public_link(&self, username: &str, link_id: Uuid) -> AppResult<Option<Link>>;

    async fn increment_clicks(&self, link_id: Uuid) -> AppResult<()>;
}

fn clean_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::InvalidInput(format!(
            "Title must be between 1 and {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn clean_url(url: &str) -> AppResult<String> {
    normalize_url(url).ok_or_else(|| AppError::InvalidInput("Invalid URL".into()))
}

#[derive(Clone)]
pub struct LinkUseCases {
    repo: Arc<dyn LinkRepo>,
    users: Arc<dyn UserRepo>,
    settings: Arc<dyn SettingsRepo>,
    analytics: Arc<dyn AnalyticsRepo>,
}

impl LinkUseCases {
    pub fn new(
        repo: Arc<dyn LinkRepo>,
        users: Arc<dyn UserRepo>,
        settings: Arc<dyn SettingsRepo>,
        analytics: Arc<dyn AnalyticsRepo>,
    ) -> Self {
        Self {
            repo,
            users,
            settings,
            analytics,
        }
    }

    pub async fn list_links(&self, user_id: Uuid) -> AppResult<Vec<Link>> {
        self.repo.list_links(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn create_link(
        &self,
        user_id: Uuid,
        title: &str,
        url: &str,
        is_active: Option<bool>,
    ) -> AppResult<Link> {
        let link = NewLink {
            title: clean_title(title)?,
            url: clean_url(url)?,
            is_active: is_active.unwrap_or(true),
        };

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let max_links = if user.is_premium() {
            None
        } else {
            Some(i64::from(self.settings.get_settings().await?.max_links_free))
        };

        self.repo.create_link(user_id, &link, max_links).await
    }

    #[instrument(skip(self))]
    pub async fn update_link(
        &self,
        user_id: Uuid,
        link_id: Uuid,
        changes: LinkChanges,
    ) -> AppResult<Link> {
        let changes = LinkChanges {
            title: changes.title.as_deref().map(clean_title).transpose()?,
            url: changes.url.as_deref().map(clean_url).transpose()?,
            is_active: changes.is_active,
        };
        self.repo.update_link(user_id, link_id, &changes).await
    }

    #[instrument(skip(self))]
    pub async fn delete_link(&self, user_id: Uuid, link_id: Uuid) -> AppResult<()> {
        self.repo.delete_link(user_id, link_id).await
    }

    /// `ids` must be a permutation of the user's links; position of `ids[i]`
    /// becomes `i`.
    #[instrument(skip(self))]
    pub async fn reorder_links(&self, user_id: Uuid, ids: Vec<Uuid>) -> AppResult<Vec<Link>> {
        let current: Vec<Uuid> = self
            .repo
            .list_links(user_id)
            .await?
            .into_iter()
            .map(|l| l.id)
            .collect();
        validate_reorder(&current, &ids).map_err(|e| AppError::InvalidInput(e.to_string()))?;

        self.repo.reorder_links(user_id, &ids).await
    }

    /// Counts a visitor click and returns the URL to redirect to.
    #[instrument(skip(self, referrer))]
    pub async fn record_click(
        &self,
        username: &str,
        link_id: Uuid,
        referrer: Option<&str>,
    ) -> AppResult<String> {
        let username = username.trim().to_lowercase();
        let link = self
            .repo
            .find_public_link(&username, link_id)
            .await?
            .ok_or(AppError::NotFound)?;

        self.repo.increment_clicks(link.id).await?;

        let event = NewAnalyticsEvent::new(
            link.user_id,
            AnalyticsEventKind::LinkClick,
            Some(link.id),
            referrer,
        );
        if let Err(e) = self.analytics.record_event(&event).await {
            tracing::warn!(error = %e, link_id = %link.id, "Failed to record link click event");
        }

        Ok(link.url)
    }
}
