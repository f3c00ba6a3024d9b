use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_column},
    app_error::{AppError, AppResult},
    domain::entities::user::UserRole,
    use_cases::{
        profile::{ProfileFields, ProfileRepo},
        user::{UserProfile, UserRepo},
    },
};

pub(crate) const USER_COLUMNS: &str = "id, email, username, display_name, bio, avatar_url, role, \
     gateway_customer_id, premium_until, total_paid_cents, payments_count, created_at, updated_at";

// User struct as stored in the db.
#[derive(sqlx::FromRow, Debug, Serialize)]
pub struct UserDb {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub gateway_customer_id: Option<String>,
    pub premium_until: Option<DateTime<Utc>>,
    pub total_paid_cents: i64,
    pub payments_count: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl TryFrom<UserDb> for UserProfile {
    type Error = AppError;

    fn try_from(r: UserDb) -> AppResult<Self> {
        let role: UserRole = parse_column(&r.role, "role", r.id)?;
        Ok(UserProfile {
            id: r.id,
            email: r.email,
            username: r.username,
            display_name: r.display_name,
            bio: r.bio,
            avatar_url: r.avatar_url,
            role,
            gateway_customer_id: r.gateway_customer_id,
            premium_until: r.premium_until,
            total_paid_cents: r.total_paid_cents,
            payments_count: r.payments_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn find_or_create_by_email(&self, email: &str, role: UserRole) -> AppResult<UserProfile> {
        // An admin email promotes an existing account, it never demotes one.
        let sql = format!(
            r#"
                INSERT INTO users (id, email, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (email) DO UPDATE
                SET role = CASE WHEN EXCLUDED.role = 'admin' THEN 'admin' ELSE users.role END
                RETURNING {USER_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(role.as_ref())
            .fetch_one(&self.pool)
            .await?;
        rec.try_into()
    }

    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        rec.map(UserProfile::try_from).transpose()
    }

    async fn set_gateway_customer_id(&self, user_id: Uuid, customer_id: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET gateway_customer_id = $2, updated_at = now() AT TIME ZONE 'utc' WHERE id = $1",
        )
        .bind(user_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRepo for PostgresPersistence {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(username.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        rec.map(UserProfile::try_from).transpose()
    }

    async fn update_profile(&self, user_id: Uuid, fields: &ProfileFields) -> AppResult<UserProfile> {
        let sql = format!(
            r#"
                UPDATE users
                SET username = $2, display_name = $3, bio = $4, avatar_url = $5,
                    updated_at = now() AT TIME ZONE 'utc'
                WHERE id = $1
                RETURNING {USER_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(user_id)
            .bind(&fields.username)
            .bind(&fields.display_name)
            .bind(&fields.bio)
            .bind(&fields.avatar_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict("Username is already taken".into()),
                other => other,
            })?
            .ok_or(AppError::InvalidCredentials)?;
        rec.try_into()
    }
}
