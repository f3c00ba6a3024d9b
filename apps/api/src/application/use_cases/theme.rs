use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::theme::{ButtonStyle, Font, Theme, ThemePreset, normalize_hex_color},
    use_cases::user::UserRepo,
};

#[async_trait]
pub trait ThemeRepo: Send + Sync {
    /// `None` when the user never saved a theme.
    async fn get_theme(&self, user_id: Uuid) -> AppResult<Option<Theme>>;
    async fn save_theme(&self, user_id: Uuid, theme: &Theme) -> AppResult<()>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeInput {
    #[serde(default)]
    pub preset: ThemePreset,
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub button_color: Option<String>,
    pub button_text_color: Option<String>,
    pub button_style: Option<ButtonStyle>,
    pub font: Option<Font>,
}

fn color(input: Option<&str>, fallback: &str, field: &str) -> AppResult<String> {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(fallback.to_string()),
        Some(raw) => normalize_hex_color(raw)
            .ok_or_else(|| AppError::InvalidInput(format!("{field} must be a #RGB or #RRGGBB color"))),
    }
}

/// Builds a theme from user input, filling missing colors from the preset.
pub fn resolve_theme(input: &ThemeInput) -> AppResult<Theme> {
    let palette = input.preset.palette();
    Ok(Theme {
        preset: input.preset,
        background_color: color(
            input.background_color.as_deref(),
            palette.background,
            "background_color",
        )?,
        text_color: color(input.text_color.as_deref(), palette.text, "text_color")?,
        button_color: color(input.button_color.as_deref(), palette.button, "button_color")?,
        button_text_color: color(
            input.button_text_color.as_deref(),
            palette.button_text,
            "button_text_color",
        )?,
        button_style: input.button_style.unwrap_or_default(),
        font: input.font.unwrap_or_default(),
    })
}

/// Theme shown to visitors. Premium styling of a lapsed account falls back
/// to the default palette while keeping the free choices.
pub fn effective_theme(theme: Theme, is_premium: bool) -> Theme {
    if is_premium || !theme.requires_premium() {
        return theme;
    }
    Theme {
        button_style: theme.button_style,
        font: theme.font,
        ..Theme::default()
    }
}

#[derive(Clone)]
pub struct ThemeUseCases {
    repo: Arc<dyn ThemeRepo>,
    users: Arc<dyn UserRepo>,
}

impl ThemeUseCases {
    pub fn new(repo: Arc<dyn ThemeRepo>, users: Arc<dyn UserRepo>) -> Self {
        Self { repo, users }
    }

    pub async fn get_theme(&self, user_id: Uuid) -> AppResult<Theme> {
        Ok(self.repo.get_theme(user_id).await?.unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn update_theme(&self, user_id: Uuid, input: ThemeInput) -> AppResult<Theme> {
        let theme = resolve_theme(&input)?;

        if theme.requires_premium() {
            let user = self
                .users
                .get_by_id(user_id)
                .await?
                .ok_or(AppError::InvalidCredentials)?;
            if !user.is_premium() {
                return Err(AppError::PremiumRequired);
            }
        }

        self.repo.save_theme(user_id, &theme).await?;
        Ok(theme)
    }
}
