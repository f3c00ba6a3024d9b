use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::types::Json;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, lock_owner, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    domain::entities::form::{Form, FormField, FormSubmission},
    use_cases::forms::{FormDraft, FormRepo},
};

const FORM_COLUMNS: &str =
    "id, user_id, title, description, fields, is_active, notify_owner, created_at, updated_at";

#[derive(sqlx::FromRow, Debug)]
struct FormDb {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    fields: serde_json::Value,
    is_active: bool,
    notify_owner: bool,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl From<FormDb> for Form {
    fn from(r: FormDb) -> Self {
        let fields: Vec<FormField> =
            parse_json_with_fallback(&r.fields, "fields", "form", &r.id.to_string());
        Form {
            id: r.id,
            user_id: r.user_id,
            title: r.title,
            description: r.description,
            fields,
            is_active: r.is_active,
            notify_owner: r.notify_owner,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
struct SubmissionDb {
    id: Uuid,
    form_id: Uuid,
    data: serde_json::Value,
    created_at: Option<NaiveDateTime>,
}

impl From<SubmissionDb> for FormSubmission {
    fn from(r: SubmissionDb) -> Self {
        let values: BTreeMap<String, String> =
            parse_json_with_fallback(&r.data, "data", "form_submission", &r.id.to_string());
        FormSubmission {
            id: r.id,
            form_id: r.form_id,
            values,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl FormRepo for PostgresPersistence {
    async fn list_forms(&self, user_id: Uuid) -> AppResult<Vec<Form>> {
        let sql =
            format!("SELECT {FORM_COLUMNS} FROM forms WHERE user_id = $1 ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, FormDb>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Form::from).collect())
    }

    async fn get_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<Option<Form>> {
        let sql = format!("SELECT {FORM_COLUMNS} FROM forms WHERE id = $1 AND user_id = $2");
        let rec = sqlx::query_as::<_, FormDb>(&sql)
            .bind(form_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(rec.map(Form::from))
    }

    async fn create_form(
        &self,
        user_id: Uuid,
        draft: &FormDraft,
        max_forms: Option<i64>,
    ) -> AppResult<Form> {
        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, user_id).await?;

        if let Some(max) = max_forms {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM forms WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
            if count >= max {
                return Err(AppError::LimitReached(format!(
                    "The free plan allows up to {max} forms"
                )));
            }
        }

        let sql = format!(
            r#"
                INSERT INTO forms (id, user_id, title, description, fields, is_active, notify_owner)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING {FORM_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, FormDb>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(Json(&draft.fields))
            .bind(draft.is_active)
            .bind(draft.notify_owner)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(rec.into())
    }

    async fn update_form(&self, form: &Form) -> AppResult<Form> {
        let sql = format!(
            r#"
                UPDATE forms
                SET title = $3, description = $4, fields = $5, is_active = $6, notify_owner = $7,
                    updated_at = now() AT TIME ZONE 'utc'
                WHERE id = $1 AND user_id = $2
                RETURNING {FORM_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, FormDb>(&sql)
            .bind(form.id)
            .bind(form.user_id)
            .bind(&form.title)
            .bind(&form.description)
            .bind(Json(&form.fields))
            .bind(form.is_active)
            .bind(form.notify_owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound)?;
        Ok(rec.into())
    }

    async fn delete_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM forms WHERE id = $1 AND user_id = $2")
            .bind(form_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_public_form(&self, username: &str, form_id: Uuid) -> AppResult<Option<Form>> {
        let rec = sqlx::query_as::<_, FormDb>(
            r#"
                SELECT f.id, f.user_id, f.title, f.description, f.fields, f.is_active,
                       f.notify_owner, f.created_at, f.updated_at
                FROM forms f
                JOIN users u ON u.id = f.user_id
                WHERE u.username = $1 AND f.id = $2 AND f.is_active
            "#,
        )
        .bind(username.trim().to_lowercase())
        .bind(form_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.map(Form::from))
    }

    async fn insert_submission(
        &self,
        form_id: Uuid,
        values: &BTreeMap<String, String>,
    ) -> AppResult<FormSubmission> {
        let rec = sqlx::query_as::<_, SubmissionDb>(
            r#"
                INSERT INTO form_submissions (id, form_id, data)
                VALUES ($1, $2, $3)
                RETURNING id, form_id, data, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(form_id)
        .bind(Json(values))
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.into())
    }

    async fn list_submissions(
        &self,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<FormSubmission>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM form_submissions WHERE form_id = $1")
                .bind(form_id)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, SubmissionDb>(
            r#"
                SELECT id, form_id, data, created_at
                FROM form_submissions
                WHERE form_id = $1
                ORDER BY created_at DESC, id
                LIMIT $2 OFFSET $3
            "#,
        )
        .bind(form_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(FormSubmission::from).collect(), total))
    }
}
