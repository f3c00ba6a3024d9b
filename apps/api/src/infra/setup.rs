use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::{email::resend::ResendEmailSender, http::app_state::AppState},
    application::ports::payment_gateway::PaymentGateway,
    infra::{
        InfraError,
        config::{AppConfig, GatewayKind},
        dummy_gateway::DummyPaymentGateway,
        gateway_client::HttpPaymentGateway,
        http_client::build_client,
        magic_links::RedisMagicLinkStore,
        postgres_persistence,
        rate_limit::{RateLimitPolicy, RedisRateLimiter},
    },
    use_cases::{
        admin::AdminUseCases, analytics::AnalyticsUseCases, billing::BillingUseCases,
        forms::FormUseCases, links::LinkUseCases, profile::ProfileUseCases,
        social_links::SocialLinkUseCases, theme::ThemeUseCases, user::AuthUseCases,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    let app_origin = config.app_origin_str();

    let persistence = Arc::new(postgres_persistence(&config.database_url).await?);

    let rate_limiter = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            RateLimitPolicy {
                window_secs: config.rate_limit_window_secs,
                max_per_ip: config.rate_limit_per_ip,
                max_per_email: config.rate_limit_per_email,
            },
        )
        .await?,
    );

    let magic_links = Arc::new(RedisMagicLinkStore::new(&config.redis_url).await?);

    let http_client = build_client()?;
    let email = Arc::new(ResendEmailSender::new(
        http_client.clone(),
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    let gateway: Arc<dyn PaymentGateway> = match (config.payment_gateway, &config.gateway_base_url)
    {
        (GatewayKind::Http, Some(base_url)) => Arc::new(HttpPaymentGateway::new(
            http_client,
            base_url.clone(),
            config.gateway_api_key.clone(),
        )),
        (GatewayKind::Http, None) => {
            return Err(InfraError::ConfigMissing {
                var: "GATEWAY_BASE_URL",
            }
            .into());
        }
        (GatewayKind::Dummy, _) => {
            tracing::warn!("Using the dummy payment gateway; no real charges will be made");
            Arc::new(DummyPaymentGateway::new())
        }
    };

    let analytics_use_cases = Arc::new(AnalyticsUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
    ));

    let auth_use_cases = AuthUseCases::new(
        persistence.clone(),
        magic_links,
        email.clone(),
        persistence.clone(),
        gateway.clone(),
        app_origin.clone(),
        config.admin_emails.clone(),
    );

    let profile_use_cases = ProfileUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        analytics_use_cases.clone(),
        app_origin.clone(),
    );

    let link_use_cases = LinkUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
    );

    let social_link_use_cases = SocialLinkUseCases::new(persistence.clone());

    let form_use_cases = FormUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        email.clone(),
        app_origin.clone(),
    );

    let theme_use_cases = ThemeUseCases::new(persistence.clone(), persistence.clone());

    let billing_use_cases = BillingUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        gateway,
        email,
        app_origin,
    );

    let admin_use_cases = AdminUseCases::new(persistence.clone(), persistence);

    tracing::info!(
        gateway = %config.payment_gateway,
        admins = config.admin_emails.len(),
        "Application state initialized"
    );

    Ok(AppState {
        config: Arc::new(config),
        auth_use_cases: Arc::new(auth_use_cases),
        profile_use_cases: Arc::new(profile_use_cases),
        link_use_cases: Arc::new(link_use_cases),
        social_link_use_cases: Arc::new(social_link_use_cases),
        form_use_cases: Arc::new(form_use_cases),
        theme_use_cases: Arc::new(theme_use_cases),
        analytics_use_cases,
        billing_use_cases: Arc::new(billing_use_cases),
        admin_use_cases: Arc::new(admin_use_cases),
        rate_limiter,
    })
}

/// Pretty logs on the console, JSON lines in `app.log`.
pub fn init_tracing() -> Result<(), InfraError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "biolink_api=debug,tower_http=debug".into());

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    let file = File::create("app.log").map_err(InfraError::LogFile)?;
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
    Ok(())
}
