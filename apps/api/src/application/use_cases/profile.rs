use std::sync::Arc;

use async_trait::async_trait;
use biolink_types::{
    PublicForm, PublicFormField, PublicLink, PublicProfile, PublicSocialLink, PublicTheme,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::validators::{is_http_url, is_valid_username},
    domain::entities::{form::Form, social_link::sort_for_display, theme::Theme},
    use_cases::{
        analytics::AnalyticsUseCases,
        forms::FormRepo,
        links::LinkRepo,
        social_links::SocialLinkRepo,
        theme::{ThemeRepo, effective_theme},
        user::{UserProfile, UserRepo},
    },
};

pub const MAX_DISPLAY_NAME_LEN: usize = 60;
pub const MAX_BIO_LEN: usize = 280;

/// Editable profile columns, written as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

/// Patch body: absent fields stay, empty strings clear optional ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub public_url: Option<String>,
}

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<UserProfile>>;

    /// Fails with `Conflict` when the username belongs to someone else.
    async fn update_profile(&self, user_id: Uuid, fields: &ProfileFields) -> AppResult<UserProfile>;
}

fn optional_text(value: &str, max: usize, field: &str) -> AppResult<Option<String>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > max {
        return Err(AppError::InvalidInput(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

/// Applies a patch on top of the current values.
pub fn apply_patch(current: &UserProfile, patch: &ProfilePatch) -> AppResult<ProfileFields> {
    let mut fields = ProfileFields {
        username: current.username.clone(),
        display_name: current.display_name.clone(),
        bio: current.bio.clone(),
        avatar_url: current.avatar_url.clone(),
    };

    if let Some(username) = patch.username.as_deref() {
        let username = username.trim().to_lowercase();
        if !is_valid_username(&username) {
            return Err(AppError::InvalidInput(
                "Username must be 3-30 characters of a-z, 0-9, '_' or '.', start with a letter or digit, and not be reserved".into(),
            ));
        }
        fields.username = Some(username);
    }
    if let Some(display_name) = patch.display_name.as_deref() {
        fields.display_name = optional_text(display_name, MAX_DISPLAY_NAME_LEN, "display_name")?;
    }
    if let Some(bio) = patch.bio.as_deref() {
        fields.bio = optional_text(bio, MAX_BIO_LEN, "bio")?;
    }
    if let Some(avatar_url) = patch.avatar_url.as_deref() {
        let avatar_url = avatar_url.trim();
        fields.avatar_url = if avatar_url.is_empty() {
            None
        } else if is_http_url(avatar_url) {
            Some(avatar_url.to_string())
        } else {
            return Err(AppError::InvalidInput(
                "avatar_url must be an http(s) URL".into(),
            ));
        };
    }

    Ok(fields)
}

fn public_theme(theme: &Theme) -> PublicTheme {
    PublicTheme {
        preset: theme.preset.to_string(),
        background_color: theme.background_color.clone(),
        text_color: theme.text_color.clone(),
        button_color: theme.button_color.clone(),
        button_text_color: theme.button_text_color.clone(),
        button_style: theme.button_style.to_string(),
        font: theme.font.to_string(),
    }
}

fn public_form(form: Form) -> PublicForm {
    PublicForm {
        id: form.id.to_string(),
        title: form.title,
        description: form.description,
        fields: form
            .fields
            .into_iter()
            .map(|f| PublicFormField {
                name: f.name,
                label: f.label,
                kind: f.kind.to_string(),
                required: f.required,
                max_length: f.max_length,
            })
            .collect(),
    }
}

#[derive(Clone)]
pub struct ProfileUseCases {
    repo: Arc<dyn ProfileRepo>,
    users: Arc<dyn UserRepo>,
    links: Arc<dyn LinkRepo>,
    social_links: Arc<dyn SocialLinkRepo>,
    forms: Arc<dyn FormRepo>,
    themes: Arc<dyn ThemeRepo>,
    analytics: Arc<AnalyticsUseCases>,
    app_origin: String,
}

impl ProfileUseCases {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn ProfileRepo>,
        users: Arc<dyn UserRepo>,
        links: Arc<dyn LinkRepo>,
        social_links: Arc<dyn SocialLinkRepo>,
        forms: Arc<dyn FormRepo>,
        themes: Arc<dyn ThemeRepo>,
        analytics: Arc<AnalyticsUseCases>,
        app_origin: String,
    ) -> Self {
        Self {
            repo,
            users,
            links,
            social_links,
            forms,
            themes,
            analytics,
            app_origin: app_origin.trim_end_matches('/').to_string(),
        }
    }

    fn view(&self, user: UserProfile) -> ProfileView {
        ProfileView {
            public_url: user
                .username
                .as_ref()
                .map(|u| format!("{}/{}", self.app_origin, u)),
            username: user.username,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<ProfileView> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        Ok(self.view(user))
    }

    #[instrument(skip(self))]
    pub async fn update_profile(&self, user_id: Uuid, patch: ProfilePatch) -> AppResult<ProfileView> {
        let current = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let fields = apply_patch(&current, &patch)?;

        if let Some(username) = fields.username.as_deref()
            && current.username.as_deref() != Some(username)
            && let Some(owner) = self.repo.get_by_username(username).await?
            && owner.id != user_id
        {
            return Err(AppError::Conflict("Username is already taken".into()));
        }

        let updated = self.repo.update_profile(user_id, &fields).await?;
        Ok(self.view(updated))
    }

    /// Page payload for `username`; records a page view on the way out.
    #[instrument(skip(self, referrer))]
    pub async fn get_public_profile(
        &self,
        username: &str,
        referrer: Option<&str>,
    ) -> AppResult<PublicProfile> {
        let username = username.trim().to_lowercase();
        let user = self
            .repo
            .get_by_username(&username)
            .await?
            .ok_or(AppError::NotFound)?;
        let is_premium = user.is_premium();

        let links = self
            .links
            .list_links(user.id)
            .await?
            .into_iter()
            .filter(|l| l.is_active)
            .map(|l| PublicLink {
                id: l.id.to_string(),
                title: l.title,
                url: l.url,
            })
            .collect();

        let mut social = self.social_links.list_social_links(user.id).await?;
        sort_for_display(&mut social);
        let social_links = social
            .into_iter()
            .map(|s| PublicSocialLink {
                platform: s.platform.to_string(),
                url: s.url,
            })
            .collect();

        let forms = self
            .forms
            .list_forms(user.id)
            .await?
            .into_iter()
            .filter(|f| f.is_active)
            .map(public_form)
            .collect();

        let theme = effective_theme(
            self.themes.get_theme(user.id).await?.unwrap_or_default(),
            is_premium,
        );

        self.analytics.record_page_view(user.id, referrer).await;

        Ok(PublicProfile {
            username,
            display_name: user.display_name,
            bio: user.bio,
            avatar_url: user.avatar_url,
            theme: public_theme(&theme),
            links,
            social_links,
            forms,
            show_branding: !is_premium,
        })
    }
}
