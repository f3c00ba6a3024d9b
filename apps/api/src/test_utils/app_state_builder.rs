//! Test app state builder for HTTP-level integration testing.
//!
//! This module provides `TestAppStateBuilder` which creates an `AppState`
//! backed by one `InMemoryPersistence`, the dummy gateway and recording
//! email sender, for testing HTTP endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum_extra::extract::cookie::Cookie;
use secrecy::SecretString;
use time::Duration;
use url::Url;
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, middleware::ACCESS_COOKIE},
    application::jwt,
    infra::{
        RateLimiterTrait,
        config::{AppConfig, GatewayKind},
        dummy_gateway::DummyPaymentGateway,
    },
    test_utils::{
        InMemoryMagicLinkStore, InMemoryPersistence, InMemoryRateLimiter, RecordingEmailSender,
        TEST_APP_ORIGIN,
    },
    use_cases::{
        admin::AdminUseCases,
        analytics::AnalyticsUseCases,
        billing::BillingUseCases,
        forms::FormUseCases,
        links::LinkUseCases,
        profile::ProfileUseCases,
        social_links::SocialLinkUseCases,
        theme::ThemeUseCases,
        user::{AuthUseCases, UserProfile},
    },
};

pub const TEST_JWT_SECRET: &str = "test_jwt_secret";
pub const TEST_WEBHOOK_SECRET: &str = "test_webhook_secret";

/// Handles a route test needs besides the state itself.
pub struct TestApp {
    pub state: AppState,
    pub persistence: Arc<InMemoryPersistence>,
    pub email: Arc<RecordingEmailSender>,
    pub gateway: Arc<DummyPaymentGateway>,
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let user = create_test_user(|u| u.username = Some("ana".to_string()));
/// let app = TestAppStateBuilder::new().with_user(user).build_app().await;
/// ```
pub struct TestAppStateBuilder {
    users: Vec<UserProfile>,
    admin_emails: Vec<String>,
    rate_limiter: Option<Arc<dyn RateLimiterTrait>>,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            admin_emails: vec![],
            rate_limiter: None,
        }
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_admin_email(mut self, email: &str) -> Self {
        self.admin_emails.push(email.to_lowercase());
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiterTrait>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Build the AppState along with the mocks behind it.
    pub async fn build_app(self) -> TestApp {
        let persistence = Arc::new(InMemoryPersistence::new());
        for user in self.users {
            persistence.insert_user(user).await;
        }
        let email = Arc::new(RecordingEmailSender::default());
        let gateway = Arc::new(DummyPaymentGateway::new());

        let config = Arc::new(AppConfig {
            jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
            access_token_ttl: Duration::hours(24),
            refresh_token_ttl: Duration::days(30),
            app_origin: Url::parse(TEST_APP_ORIGIN).unwrap(),
            cors_origin: HeaderValue::from_static(TEST_APP_ORIGIN),
            magic_link_ttl_minutes: 15,
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            redis_url: String::new(),
            rate_limit_window_secs: 60,
            rate_limit_per_ip: 60,
            rate_limit_per_email: 30,
            database_url: String::new(),
            trust_proxy: false,
            resend_api_key: SecretString::new("test_resend_key".into()),
            email_from: "Biolink <noreply@bio.example.com>".to_string(),
            admin_emails: self.admin_emails.clone(),
            payment_gateway: GatewayKind::Dummy,
            gateway_base_url: None,
            gateway_api_key: SecretString::new(String::new().into()),
            webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        });

        let analytics_use_cases = Arc::new(AnalyticsUseCases::new(
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
        ));

        let auth_use_cases = Arc::new(AuthUseCases::new(
            persistence.clone(),
            Arc::new(InMemoryMagicLinkStore::default()),
            email.clone(),
            persistence.clone(),
            gateway.clone(),
            TEST_APP_ORIGIN.to_string(),
            self.admin_emails,
        ));

        let profile_use_cases = Arc::new(ProfileUseCases::new(
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            analytics_use_cases.clone(),
            TEST_APP_ORIGIN.to_string(),
        ));

        let link_use_cases = Arc::new(LinkUseCases::new(
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
        ));

        let social_link_use_cases = Arc::new(SocialLinkUseCases::new(persistence.clone()));

        let form_use_cases = Arc::new(FormUseCases::new(
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            email.clone(),
            TEST_APP_ORIGIN.to_string(),
        ));

        let theme_use_cases = Arc::new(ThemeUseCases::new(persistence.clone(), persistence.clone()));

        let billing_use_cases = Arc::new(BillingUseCases::new(
            persistence.clone(),
            persistence.clone(),
            persistence.clone(),
            gateway.clone(),
            email.clone(),
            TEST_APP_ORIGIN.to_string(),
        ));

        let admin_use_cases = Arc::new(AdminUseCases::new(persistence.clone(), persistence.clone()));

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(InMemoryRateLimiter::permissive()));

        let state = AppState {
            config,
            auth_use_cases,
            profile_use_cases,
            link_use_cases,
            social_link_use_cases,
            form_use_cases,
            theme_use_cases,
            analytics_use_cases,
            billing_use_cases,
            admin_use_cases,
            rate_limiter,
        };

        TestApp {
            state,
            persistence,
            email,
            gateway,
        }
    }

    pub async fn build(self) -> AppState {
        self.build_app().await.state
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A valid `access_token` cookie for `user_id`.
pub fn access_cookie(user_id: Uuid) -> Cookie<'static> {
    let token = jwt::issue(
        user_id,
        &SecretString::new(TEST_JWT_SECRET.into()),
        Duration::hours(1),
    )
    .unwrap();
    Cookie::new(ACCESS_COOKIE, token)
}
