use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, lock_owner},
    app_error::{AppError, AppResult},
    domain::entities::link::{Link, validate_reorder},
    use_cases::links::{LinkChanges, LinkRepo, NewLink},
};

const LINK_COLUMNS: &str =
    "id, user_id, title, url, position, is_active, clicks, created_at, updated_at";

#[async_trait]
impl LinkRepo for PostgresPersistence {
    async fn list_links(&self, user_id: Uuid) -> AppResult<Vec<Link>> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM links WHERE user_id = $1 ORDER BY position");
        let rows = sqlx::query_as::<_, LinkDb>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn create_link(
        &self,
        user_id: Uuid,
        link: &NewLink,
        max_links: Option<i64>,
    ) -> AppResult<Link> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM links WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        if let Some(max) = max_links
            && count >= max
        {
            return Err(AppError::LimitReached(format!(
                "The free plan allows up to {max} links"
            )));
        }
        let position = i32::try_from(count)
            .map_err(|_| AppError::Internal("Link position overflow".into()))?;

        let sql = format!(
            r#"
                INSERT INTO links (id, user_id, title, url, position, is_active)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {LINK_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, LinkDb>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&link.title)
            .bind(&link.url)
            .bind(position)
            .bind(link.is_active)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(rec.into())
    }

    async fn update_link(
        &self,
        user_id: Uuid,
        link_id: Uuid,
        changes: &LinkChanges,
    ) -> AppResult<Link> {
        let sql = format!(
            r#"
                UPDATE links
                SET title = COALESCE($3, title),
                    url = COALESCE($4, url),
                    is_active = COALESCE($5, is_active),
                    updated_at = now() AT TIME ZONE 'utc'
                WHERE id = $1 AND user_id = $2
                RETURNING {LINK_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, LinkDb>(&sql)
            .bind(link_id)
            .bind(user_id)
            .bind(&changes.title)
            .bind(&changes.url)
            .bind(changes.is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(rec.into())
    }

    async fn delete_link(&self, user_id: Uuid, link_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let position: i32 = sqlx::query_scalar(
            "DELETE FROM links WHERE id = $1 AND user_id = $2 RETURNING position",
        )
        .bind(link_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound)?;

        sqlx::query(
            r#"
                UPDATE links
                SET position = position - 1, updated_at = now() AT TIME ZONE 'utc'
                WHERE user_id = $1 AND position > $2
            "#,
        )
        .bind(user_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn reorder_links(&self, user_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Link>> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        let current: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM links WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;
        validate_reorder(&current, ids).map_err(|e| {
            AppError::Conflict(format!("Links changed while reordering ({e}), reload and retry"))
        })?;

        // Positions are checked at commit, so the permutation can land in one statement.
        sqlx::query(
            r#"
                UPDATE links AS l
                SET position = (o.ord - 1)::int, updated_at = now() AT TIME ZONE 'utc'
                FROM UNNEST($2::uuid[]) WITH ORDINALITY AS o(id, ord)
                WHERE l.id = o.id AND l.user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(ids)
        .execute(&mut *tx)
        .await?;

        let sql = format!("SELECT {LINK_COLUMNS} FROM links WHERE user_id = $1 ORDER BY position");
        let rows = sqlx::query_as::<_, LinkDb>(&sql)
            .bind(user_id)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(rows.into_iter().map(Link::from).collect())
    }

    async fn find_public_link(&self, username: &str, link_id: Uuid) -> AppResult<Option<Link>> {
        let rec = sqlx::query_as::<_, LinkDb>(
            r#"
                SELECT l.id, l.user_id, l.title, l.url, l.position, l.is_active, l.clicks,
                       l.created_at, l.updated_at
                FROM links l
                JOIN users u ON u.id = l.user_id
                WHERE u.username = $1 AND l.id = $2 AND l.is_active
            "#,
        )
        .bind(username.trim().to_lowercase())
        .bind(link_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.map(Link::from))
    }

    async fn increment_clicks(&self, link_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE links SET clicks = clicks + 1 WHERE id = $1")
            .bind(link_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow, Debug)]
struct LinkDb {
    id: Uuid,
    user_id: Uuid,
    title: String,
    url: String,
    position: i32,
    is_active: bool,
    clicks: i64,
    created_at: Option<chrono::NaiveDateTime>,
    updated_at: Option<chrono::NaiveDateTime>,
}

impl From<LinkDb> for Link {
    fn from(r: LinkDb) -> Self {
        Link {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            url: r.url,
            position: r.position,
            is_active: r.is_active,
            clicks: r.clicks,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
