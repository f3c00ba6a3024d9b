use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_column},
    app_error::{AppError, AppResult},
    domain::entities::social_link::{SocialLink, SocialPlatform, sort_for_display},
    use_cases::social_links::SocialLinkRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct SocialLinkDb {
    id: Uuid,
    user_id: Uuid,
    platform: String,
    url: String,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl TryFrom<SocialLinkDb> for SocialLink {
    type Error = AppError;

    fn try_from(r: SocialLinkDb) -> AppResult<Self> {
        Ok(SocialLink {
            platform: parse_column(&r.platform, "platform", r.id)?,
            id: r.id,
            user_id: r.user_id,
            url: r.url,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl SocialLinkRepo for PostgresPersistence {
    async fn list_social_links(&self, user_id: Uuid) -> AppResult<Vec<SocialLink>> {
        let rows = sqlx::query_as::<_, SocialLinkDb>(
            "SELECT id, user_id, platform, url, created_at, updated_at FROM social_links WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut links = rows
            .into_iter()
            .map(SocialLink::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        sort_for_display(&mut links);
        Ok(links)
    }

    async fn upsert_social_link(
        &self,
        user_id: Uuid,
        platform: SocialPlatform,
        url: &str,
    ) -> AppResult<SocialLink> {
        let rec = sqlx::query_as::<_, SocialLinkDb>(
            r#"
                INSERT INTO social_links (id, user_id, platform, url)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (user_id, platform) DO UPDATE
                SET url = EXCLUDED.url, updated_at = now() AT TIME ZONE 'utc'
                RETURNING id, user_id, platform, url, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(platform.as_ref())
        .bind(url)
        .fetch_one(&self.pool)
        .await?;
        rec.try_into()
    }

    async fn delete_social_link(&self, user_id: Uuid, platform: SocialPlatform) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM social_links WHERE user_id = $1 AND platform = $2")
            .bind(user_id)
            .bind(platform.as_ref())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
