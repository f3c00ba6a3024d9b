use std::sync::Arc;

use crate::{
    infra::{RateLimiterTrait, config::AppConfig},
    use_cases::{
        admin::AdminUseCases, analytics::AnalyticsUseCases, billing::BillingUseCases,
        forms::FormUseCases, links::LinkUseCases, profile::ProfileUseCases,
        social_links::SocialLinkUseCases, theme::ThemeUseCases, user::AuthUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth_use_cases: Arc<AuthUseCases>,
    pub profile_use_cases: Arc<ProfileUseCases>,
    pub link_use_cases: Arc<LinkUseCases>,
    pub social_link_use_cases: Arc<SocialLinkUseCases>,
    pub form_use_cases: Arc<FormUseCases>,
    pub theme_use_cases: Arc<ThemeUseCases>,
    pub analytics_use_cases: Arc<AnalyticsUseCases>,
    pub billing_use_cases: Arc<BillingUseCases>,
    pub admin_use_cases: Arc<AdminUseCases>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
