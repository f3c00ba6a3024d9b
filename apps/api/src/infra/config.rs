use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use strum::{AsRefStr, Display, EnumString};
use time::Duration;
use url::Url;

use super::InfraError;

/// Which `PaymentGateway` adapter to wire at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GatewayKind {
    Http,
    Dummy,
}

pub struct AppConfig {
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    pub magic_link_ttl_minutes: i64,
    pub bind_addr: SocketAddr,
    pub redis_url: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    pub rate_limit_per_email: u64,
    pub database_url: String,
    /// Whether to trust X-Forwarded-For headers. Set to true when behind a reverse proxy (Caddy, nginx).
    /// SECURITY: Only enable this when the API is not directly exposed to the internet.
    pub trust_proxy: bool,
    pub resend_api_key: SecretString,
    pub email_from: String,
    /// Lower-cased; these users get the admin role on login.
    pub admin_emails: Vec<String>,
    pub payment_gateway: GatewayKind,
    pub gateway_base_url: Option<Url>,
    pub gateway_api_key: SecretString,
    /// Shared secret for `x-webhook-signature`.
    pub webhook_secret: SecretString,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, InfraError> {
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());

        let refresh_token_ttl_days: i64 = get_env_default("REFRESH_TOKEN_TTL_DAYS", 30);
        let access_token_ttl_secs: i64 = get_env_default("ACCESS_TOKEN_TTL_SECS", 86_400);

        let app_origin: Url = get_env("APP_ORIGIN");
        let magic_link_ttl_minutes: i64 = get_env_default("MAGIC_LINK_TTL_MINUTES", 15);
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .map_err(|_| InfraError::ConfigInvalid {
                    var: "CORS_ORIGIN",
                    reason: "not a valid header value".into(),
                })?;

        let bind_addr: SocketAddr = get_env_default(
            "BIND_ADDR",
            SocketAddr::from(([127, 0, 0, 1], 3001)),
        );
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 120);
        let rate_limit_per_email: u64 = get_env_default("RATE_LIMIT_PER_EMAIL", 30);
        let database_url: String = get_env("DATABASE_URL");
        // Default to false for security - must explicitly enable when behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);

        let resend_api_key = SecretString::new(get_env::<String>("RESEND_API_KEY").into());
        let email_from: String = get_env("EMAIL_FROM");
        let admin_emails = parse_admin_emails(&get_env_default("ADMIN_EMAILS", String::new()));

        let payment_gateway: GatewayKind = get_env_default("PAYMENT_GATEWAY", "dummy".to_string())
            .parse()
            .map_err(|_| InfraError::ConfigInvalid {
                var: "PAYMENT_GATEWAY",
                reason: "expected `http` or `dummy`".into(),
            })?;
        let gateway_base_url: Option<Url> = match std::env::var("GATEWAY_BASE_URL") {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(raw.trim().parse().map_err(|_| InfraError::ConfigInvalid {
                    var: "GATEWAY_BASE_URL",
                    reason: "not a valid URL".into(),
                })?)
            }
            _ => None,
        };
        if payment_gateway == GatewayKind::Http && gateway_base_url.is_none() {
            return Err(InfraError::ConfigMissing {
                var: "GATEWAY_BASE_URL",
            });
        }
        let gateway_api_key =
            SecretString::new(get_env_default("GATEWAY_API_KEY", String::new()).into());
        let webhook_secret = SecretString::new(get_env::<String>("WEBHOOK_SECRET").into());

        Ok(Self {
            jwt_secret,
            access_token_ttl: Duration::seconds(access_token_ttl_secs),
            refresh_token_ttl: Duration::days(refresh_token_ttl_days),
            app_origin,
            cors_origin,
            magic_link_ttl_minutes,
            bind_addr,
            redis_url,
            rate_limit_window_secs,
            rate_limit_per_ip,
            rate_limit_per_email,
            database_url,
            trust_proxy,
            resend_api_key,
            email_from,
            admin_emails,
            payment_gateway,
            gateway_base_url,
            gateway_api_key,
            webhook_secret,
        })
    }

    /// Origin without the trailing slash `Url` always renders.
    pub fn app_origin_str(&self) -> String {
        self.app_origin.as_str().trim_end_matches('/').to_string()
    }
}

fn parse_admin_emails(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
