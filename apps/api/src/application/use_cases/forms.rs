use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::email_templates,
    domain::entities::form::{
        Form, FormField, FormSubmission, validate_fields, validate_submission,
    },
    use_cases::{
        admin::{MAX_PAGE_SIZE, SettingsRepo},
        user::{EmailSender, UserRepo},
    },
};

pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Clone)]
pub struct FormDraft {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub is_active: bool,
    pub notify_owner: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFormInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub notify_owner: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateFormInput {
    pub title: Option<String>,
    /// An empty string clears the description.
    pub description: Option<String>,
    pub fields: Option<Vec<FormField>>,
    pub is_active: Option<bool>,
    pub notify_owner: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionPage {
    pub submissions: Vec<FormSubmission>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait FormRepo: Send + Sync {
    async fn list_forms(&self, user_id: Uuid) -> AppResult<Vec<Form>>;
    async fn get_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<Option<Form>>;

    /// Fails with `LimitReached` when the user already owns `max_forms` forms.
    async fn create_form(
        &self,
        user_id: Uuid,
        draft: &FormDraft,
        max_forms: Option<i64>,
    ) -> AppResult<Form>;

    /// Writes every editable column of `form`.
    async fn update_form(&self, form: &Form) -> AppResult<Form>;
    async fn delete_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<bool>;

    /// Active form `form_id` on the page of `username`.
    async fn find_public_form(&self, username: &str, form_id: Uuid) -> AppResult<Option<Form>>;

    async fn insert_submission(
        &self,
        form_id: Uuid,
        values: &BTreeMap<String, String>,
    ) -> AppResult<FormSubmission>;

    /// Newest first, with the total count.
    async fn list_submissions(
        &self,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<FormSubmission>, i64)>;
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

fn clean_description(description: Option<&str>) -> AppResult<Option<String>> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::InvalidInput(format!(
            "Description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(description.to_string()))
}

fn clean_fields(mut fields: Vec<FormField>) -> AppResult<Vec<FormField>> {
    for field in &mut fields {
        field.name = field.name.trim().to_string();
        field.label = field.label.trim().to_string();
    }
    validate_fields(&fields).map_err(AppError::InvalidInput)?;
    Ok(fields)
}

#[derive(Clone)]
pub struct FormUseCases {
    repo: Arc<dyn FormRepo>,
    users: Arc<dyn UserRepo>,
    settings: Arc<dyn SettingsRepo>,
    email: Arc<dyn EmailSender>,
    app_origin: String,
}

impl FormUseCases {
    pub fn new(
        repo: Arc<dyn FormRepo>,
        users: Arc<dyn UserRepo>,
        settings: Arc<dyn SettingsRepo>,
        email: Arc<dyn EmailSender>,
        app_origin: String,
    ) -> Self {
        Self {
            repo,
            users,
            settings,
            email,
            app_origin,
        }
    }

    pub async fn list_forms(&self, user_id: Uuid) -> AppResult<Vec<Form>> {
        self.repo.list_forms(user_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn create_form(&self, user_id: Uuid, input: CreateFormInput) -> AppResult<Form> {
        let draft = FormDraft {
            title: clean_title(&input.title)?,
            description: clean_description(input.description.as_deref())?,
            fields: clean_fields(input.fields)?,
            is_active: input.is_active.unwrap_or(true),
            notify_owner: input.notify_owner.unwrap_or(false),
        };

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let max_forms = if user.is_premium() {
            None
        } else {
            Some(i64::from(self.settings.get_settings().await?.max_forms_free))
        };

        self.repo.create_form(user_id, &draft, max_forms).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_form(
        &self,
        user_id: Uuid,
        form_id: Uuid,
        input: UpdateFormInput,
    ) -> AppResult<Form> {
        let mut form = self
            .repo
            .get_form(user_id, form_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if let Some(title) = input.title.as_deref() {
            form.title = clean_title(title)?;
        }
        if let Some(description) = input.description.as_deref() {
            form.description = clean_description(Some(description))?;
        }
        if let Some(fields) = input.fields {
            form.fields = clean_fields(fields)?;
        }
        if let Some(is_active) = input.is_active {
            form.is_active = is_active;
        }
        if let Some(notify_owner) = input.notify_owner {
            form.notify_owner = notify_owner;
        }

        self.repo.update_form(&form).await
    }

    #[instrument(skip(self))]
    pub async fn delete_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<()> {
        if !self.repo.delete_form(user_id, form_id).await? {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Stores a visitor's submission. The owner notification is best effort.
    #[instrument(skip(self, values))]
    pub async fn submit_form(
        &self,
        username: &str,
        form_id: Uuid,
        values: BTreeMap<String, serde_json::Value>,
    ) -> AppResult<FormSubmission> {
        let username = username.trim().to_lowercase();
        let form = self
            .repo
            .find_public_form(&username, form_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let cleaned = validate_submission(&form.fields, &values).map_err(AppError::InvalidInput)?;
        let submission = self.repo.insert_submission(form.id, &cleaned).await?;

        if form.notify_owner {
            self.notify_owner(&form, &cleaned).await;
        }

        Ok(submission)
    }

    async fn notify_owner(&self, form: &Form, values: &BTreeMap<String, String>) {
        let owner = match self.users.get_by_id(form.user_id).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, form_id = %form.id, "Failed to load form owner");
                return;
            }
        };

        let (subject, html) =
            email_templates::lead_notification_email(&self.app_origin, &form.title, values);
        if let Err(e) = self.email.send(&owner.email, &subject, &html).await {
            tracing::warn!(error = %e, form_id = %form.id, "Failed to send lead notification");
        }
    }

    pub async fn list_submissions(
        &self,
        user_id: Uuid,
        form_id: Uuid,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<SubmissionPage> {
        let form = self
            .repo
            .get_form(user_id, form_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let limit = limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        let (submissions, total) = self.repo.list_submissions(form.id, limit, offset).await?;

        Ok(SubmissionPage {
            submissions,
            total,
            limit,
            offset,
        })
    }
}
