use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use uuid::Uuid;

use super::InfraError;
use crate::{
    app_error::{AppError, AppResult},
    use_cases::user::MagicLinkStore,
};

/// Magic-link tokens in Redis: `biolink:magic:<hash>` → user id, single use.
#[derive(Clone)]
pub struct RedisMagicLinkStore {
    manager: ConnectionManager,
}

impl RedisMagicLinkStore {
    pub async fn new(redis_url: &str) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self { manager })
    }

    fn key(token_hash: &str) -> String {
        format!("biolink:magic:{token_hash}")
    }
}

#[async_trait]
impl MagicLinkStore for RedisMagicLinkStore {
    async fn save(&self, token_hash: &str, user_id: Uuid, ttl_minutes: i64) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let ttl_secs = u64::try_from(ttl_minutes.max(1) * 60).unwrap_or(60);

        let _: () = conn
            .set_ex(Self::key(token_hash), user_id.to_string(), ttl_secs)
            .await
            .map_err(|e| AppError::Internal(format!("magic link store: {e}")))?;
        Ok(())
    }

    async fn consume(&self, token_hash: &str) -> AppResult<Option<Uuid>> {
        let mut conn = self.manager.clone();

        // GETDEL makes the token single-use even under concurrent consumes.
        let raw: Option<String> = redis::cmd("GETDEL")
            .arg(Self::key(token_hash))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("magic link store: {e}")))?;

        raw.map(|value| {
            Uuid::parse_str(&value)
                .map_err(|e| AppError::Internal(format!("corrupt magic link entry: {e}")))
        })
        .transpose()
    }
}
