use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    domain::entities::theme::Theme,
    use_cases::theme::ThemeRepo,
};

#[async_trait]
impl ThemeRepo for PostgresPersistence {
    async fn get_theme(&self, user_id: Uuid) -> AppResult<Option<Theme>> {
        let raw: Option<Option<serde_json::Value>> =
            sqlx::query_scalar("SELECT theme FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        let Some(Some(raw)) = raw else {
            return Ok(None);
        };
        // A corrupt theme falls back to the default one.
        Ok(parse_json_with_fallback::<Option<Theme>>(
            &raw,
            "theme",
            "user",
            &user_id.to_string(),
        ))
    }

    async fn save_theme(&self, user_id: Uuid, theme: &Theme) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET theme = $2, updated_at = now() AT TIME ZONE 'utc' WHERE id = $1",
        )
        .bind(user_id)
        .bind(Json(theme))
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::InvalidCredentials);
        }
        Ok(())
    }
}
