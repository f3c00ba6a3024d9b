use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::InfraError;
use crate::app_error::{AppError, AppResult};

/// Fixed-window request limiter consulted by the HTTP middleware.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    /// Counts one request for `ip` and, when known, for `email`.
    /// Returns `Err(AppError::RateLimited)` once either counter is over its limit.
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()>;
}

/// Limits for one window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    pub window_secs: u64,
    pub max_per_ip: u64,
    pub max_per_email: u64,
}

pub fn ip_key(ip: &str) -> String {
    format!("biolink:rate:ip:{ip}")
}

pub fn email_key(email: &str) -> String {
    format!("biolink:rate:email:{}", email.trim().to_lowercase())
}

/// INCR, then start the window on the first hit. A key left without a TTL
/// would never reset, so that case gets one too.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 or redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

#[derive(Clone)]
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    policy: RateLimitPolicy,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(redis_url: &str, policy: RateLimitPolicy) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            policy,
            script: Script::new(INCR_WITH_TTL_SCRIPT),
        })
    }

    async fn hit(&self, conn: &mut ConnectionManager, key: &str, limit: u64) -> AppResult<()> {
        let current: u64 = self
            .script
            .key(key)
            .arg(self.policy.window_secs)
            .invoke_async(conn)
            .await
            .map_err(|e| AppError::Internal(format!("rate limiter: {e}")))?;

        if current > limit {
            tracing::warn!(key, current, limit, "Rate limit exceeded");
            return Err(AppError::RateLimited);
        }
        Ok(())
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, ip: &str, email: Option<&str>) -> AppResult<()> {
        let mut conn = self.manager.clone();
        self.hit(&mut conn, &ip_key(ip), self.policy.max_per_ip)
            .await?;

        if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
            self.hit(&mut conn, &email_key(email), self.policy.max_per_email)
                .await?;
        }
        Ok(())
    }
}
