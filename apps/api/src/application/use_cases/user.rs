use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates, ports::payment_gateway::PaymentGateway, validators::is_valid_email,
    },
    domain::entities::user::UserRole,
    use_cases::billing::BillingRepo,
};

/// User row as the rest of the application sees it.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub gateway_customer_id: Option<String>,
    pub premium_until: Option<DateTime<Utc>>,
    pub total_paid_cents: i64,
    pub payments_count: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl UserProfile {
    pub fn is_premium_at(&self, now: DateTime<Utc>) -> bool {
        self.premium_until.is_some_and(|until| until > now)
    }

    pub fn is_premium(&self) -> bool {
        self.is_premium_at(Utc::now())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub role: UserRole,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
}

impl From<UserProfile> for MeResponse {
    fn from(user: UserProfile) -> Self {
        Self {
            is_premium: user.is_premium(),
            id: user.id,
            email: user.email,
            username: user.username,
            role: user.role,
            premium_until: user.premium_until,
        }
    }
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Creates the user on first login. An existing user is promoted when
    /// `role` is admin and never demoted.
    async fn find_or_create_by_email(&self, email: &str, role: UserRole) -> AppResult<UserProfile>;
    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<UserProfile>>;
    async fn set_gateway_customer_id(&self, user_id: Uuid, customer_id: &str) -> AppResult<()>;
    async fn delete_user(&self, user_id: Uuid) -> AppResult<()>;
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()>;
}

#[async_trait]
pub trait MagicLinkStore: Send + Sync {
    async fn save(&self, token_hash: &str, user_id: Uuid, ttl_minutes: i64) -> AppResult<()>;
    async fn consume(&self, token_hash: &str) -> AppResult<Option<Uuid>>;
}

#[derive(Clone)]
pub struct AuthUseCases {
    repo: Arc<dyn UserRepo>,
    magic_links: Arc<dyn MagicLinkStore>,
    email: Arc<dyn EmailSender>,
    billing: Arc<dyn BillingRepo>,
    gateway: Arc<dyn PaymentGateway>,
    app_origin: String,
    admin_emails: Vec<String>,
}

impl AuthUseCases {
    pub fn new(
        repo: Arc<dyn UserRepo>,
        magic_links: Arc<dyn MagicLinkStore>,
        email: Arc<dyn EmailSender>,
        billing: Arc<dyn BillingRepo>,
        gateway: Arc<dyn PaymentGateway>,
        app_origin: String,
        admin_emails: Vec<String>,
    ) -> Self {
        Self {
            repo,
            magic_links,
            email,
            billing,
            gateway,
            app_origin: app_origin.trim_end_matches('/').to_string(),
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    fn role_for(&self, email: &str) -> UserRole {
        if self.admin_emails.iter().any(|a| a == email) {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }

    #[instrument(skip(self))]
    pub async fn request_magic_link(
        &self,
        email: &str,
        session_id: &str,
        ttl_minutes: i64,
    ) -> AppResult<()> {
        let email = email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }

        let user = self
            .repo
            .find_or_create_by_email(&email, self.role_for(&email))
            .await?;
        let raw = generate_token();
        let token_hash = hash_token(&raw, session_id);
        self.magic_links
            .save(&token_hash, user.id, ttl_minutes)
            .await?;

        let link = format!("{}/magic?token={}", self.app_origin, raw);
        let (subject, html) = email_templates::magic_link_email(&self.app_origin, &link, ttl_minutes);
        if let Err(err) = self.email.send(&email, &subject, &html).await {
            // Delivery failures are logged, never surfaced.
            tracing::error!(error = %err, "Failed to send magic link email");
        }
        Ok(())
    }

    /// Returns the user the token was issued for, or `None` when the token is
    /// unknown, expired, already used or bound to another browser session.
    #[instrument(skip(self, raw_token))]
    pub async fn consume_magic_link(
        &self,
        raw_token: &str,
        session_id: &str,
    ) -> AppResult<Option<UserProfile>> {
        let token_hash = hash_token(raw_token, session_id);
        let Some(user_id) = self.magic_links.consume(&token_hash).await? else {
            return Ok(None);
        };
        self.repo.get_by_id(user_id).await
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<UserProfile> {
        self.repo
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)
    }

    pub async fn get_me(&self, user_id: Uuid) -> AppResult<MeResponse> {
        Ok(self.get_user(user_id).await?.into())
    }

    /// Stops gateway billing before the user row (and its subscription) is
    /// removed. A failed gateway cancel aborts the deletion.
    #[instrument(skip(self))]
    pub async fn delete_account(&self, user_id: Uuid) -> AppResult<()> {
        if let Some(subscription) = self.billing.get_subscription(user_id).await?
            && subscription.status.can_cancel()
            && let Some(gateway_id) = subscription.gateway_subscription_id.as_deref()
        {
            self.gateway.cancel_subscription(gateway_id).await?;
            tracing::info!(%user_id, gateway_subscription_id = %gateway_id, "Gateway subscription canceled for account deletion");
        }

        self.repo.delete_user(user_id).await?;
        tracing::info!(%user_id, "Account deleted");
        Ok(())
    }
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_token(raw: &str, session_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hasher.update(session_id.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}
