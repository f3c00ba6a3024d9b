//! Mocks for the non-database ports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{
        CustomerId, GatewaySubscription, NewGatewaySubscription, PaymentGateway,
    },
    domain::entities::link::Link,
    test_utils::InMemoryPersistence,
    use_cases::{
        links::{LinkChanges, LinkRepo, NewLink},
        user::{EmailSender, MagicLinkStore},
    },
};

// ============================================================================
// Email
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Keeps every email instead of sending it.
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> AppResult<()> {
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

/// Every send fails, like an email provider outage.
pub struct FailingEmailSender;

#[async_trait]
impl EmailSender for FailingEmailSender {
    async fn send(&self, _to: &str, _subject: &str, _html: &str) -> AppResult<()> {
        Err(AppError::Internal("email provider unavailable".into()))
    }
}

// ============================================================================
// Payment gateway
// ============================================================================

/// Gateway that is down for every call.
pub struct FailingPaymentGateway;

#[async_trait]
impl PaymentGateway for FailingPaymentGateway {
    async fn create_customer(&self, _email: &str, _name: Option<&str>) -> AppResult<CustomerId> {
        Err(AppError::PaymentGateway("gateway unavailable".into()))
    }

    async fn create_subscription(
        &self,
        _request: &NewGatewaySubscription,
    ) -> AppResult<GatewaySubscription> {
        Err(AppError::PaymentGateway("gateway unavailable".into()))
    }

    async fn cancel_subscription(&self, _gateway_subscription_id: &str) -> AppResult<()> {
        Err(AppError::PaymentGateway("gateway unavailable".into()))
    }
}

// ============================================================================
// Links
// ============================================================================

/// Link store where another request adds a link right before every reorder
/// reaches the database.
pub struct LinkAddedDuringReorder {
    pub inner: Arc<InMemoryPersistence>,
}

#[async_trait]
impl LinkRepo for LinkAddedDuringReorder {
    async fn list_links(&self, user_id: Uuid) -> AppResult<Vec<Link>> {
        self.inner.list_links(user_id).await
    }

    async fn create_link(
        &self,
        user_id: Uuid,
        link: &NewLink,
        max_links: Option<i64>,
    ) -> AppResult<Link> {
        self.inner.create_link(user_id, link, max_links).await
    }

    async fn update_link(
        &self,
        user_id: Uuid,
        link_id: Uuid,
        changes: &LinkChanges,
    ) -> AppResult<Link> {
        self.inner.update_link(user_id, link_id, changes).await
    }

    async fn delete_link(&self, user_id: Uuid, link_id: Uuid) -> AppResult<()> {
        self.inner.delete_link(user_id, link_id).await
    }

    async fn reorder_links(&self, user_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Link>> {
        self.inner.seed_link(user_id, "Late", true).await;
        self.inner.reorder_links(user_id, ids).await
    }

    async fn find_public_link(&self, username: &str, link_id: Uuid) -> AppResult<Option<Link>> {
        self.inner.find_public_link(username, link_id).await
    }

    async fn increment_clicks(&self, link_id: Uuid) -> AppResult<()> {
        self.inner.increment_clicks(link_id).await
    }
}

// ============================================================================
// Magic links
// ============================================================================

/// Single-use token store. TTLs are ignored.
#[derive(Default)]
pub struct InMemoryMagicLinkStore {
    tokens: Mutex<HashMap<String, Uuid>>,
}

#[async_trait]
impl MagicLinkStore for InMemoryMagicLinkStore {
    async fn save(&self, token_hash: &str, user_id: Uuid, _ttl_minutes: i64) -> AppResult<()> {
        self.tokens
            .lock()
            .unwrap()
            .insert(token_hash.to_string(), user_id);
        Ok(())
    }

    async fn consume(&self, token_hash: &str) -> AppResult<Option<Uuid>> {
        Ok(self.tokens.lock().unwrap().remove(token_hash))
    }
}

// ============================================================================
// InMemoryRateLimiter
// ============================================================================

/// In-memory rate limiter for testing.
/// Uses HashMap to track request counts per key.
pub struct InMemoryRateLimiter {
    counts: Mutex<HashMap<String, u64>>,
    max_per_ip: u64,
    max_per_email: u64,
}

impl InMemoryRateLimiter {
    pub fn new(max_per_ip: u64, max_per_email: u64) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            max_per_ip,
            max_per_email,
        }
    }

    /// Create a permissive rate limiter that never blocks (for most tests).
    pub fn permissive() -> Self {
        Self::new(u64::MAX, u64::MAX)
    }
}

#[async_trait]
impl crate::infra::RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut counts = self.counts.lock().unwrap();

        let ip_key = format!("rate:ip:{ip}");
        let ip_count = counts.entry(ip_key).or_insert(0);
        *ip_count += 1;
        if *ip_count > self.max_per_ip {
            return Err(AppError::RateLimited);
        }

        if let Some(email) = email {
            let email_key = format!("rate:email:{}", email.to_lowercase());
            let email_count = counts.entry(email_key).or_insert(0);
            *email_count += 1;
            if *email_count > self.max_per_email {
                return Err(AppError::RateLimited);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::RateLimiterTrait;

    #[tokio::test]
    async fn rate_limiter_blocks_after_limit() {
        let limiter = InMemoryRateLimiter::new(2, 1);
        assert!(limiter.check("1.2.3.4", None).await.is_ok());
        assert!(limiter.check("1.2.3.4", Some("a@b.c")).await.is_ok());
        assert!(matches!(
            limiter.check("1.2.3.4", None).await,
            Err(AppError::RateLimited)
        ));
        assert!(matches!(
            limiter.check("5.6.7.8", Some("A@B.C")).await,
            Err(AppError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn magic_link_is_single_use() {
        let store = InMemoryMagicLinkStore::default();
        let user_id = Uuid::new_v4();
        store.save("hash", user_id, 15).await.unwrap();
        assert_eq!(store.consume("hash").await.unwrap(), Some(user_id));
        assert_eq!(store.consume("hash").await.unwrap(), None);
    }
}
