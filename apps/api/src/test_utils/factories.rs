//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::{
    domain::entities::user::UserRole,
    infra::dummy_gateway::DummyPaymentGateway,
    test_utils::{InMemoryPersistence, RecordingEmailSender},
    use_cases::{
        analytics::AnalyticsUseCases, billing::BillingUseCases, profile::ProfileUseCases,
        user::UserProfile,
    },
};

pub const TEST_APP_ORIGIN: &str = "https://bio.example.com";

/// Create a free, username-less test user with sensible defaults.
pub fn create_test_user(overrides: impl FnOnce(&mut UserProfile)) -> UserProfile {
    let id = Uuid::new_v4();
    let mut user = UserProfile {
        id,
        email: format!("user-{}@example.com", &id.simple().to_string()[..8]),
        username: None,
        display_name: None,
        bio: None,
        avatar_url: None,
        role: UserRole::User,
        gateway_customer_id: None,
        premium_until: None,
        total_paid_cents: 0,
        payments_count: 0,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut user);
    user
}

/// A user whose premium runs for another 30 days.
pub fn create_premium_user(overrides: impl FnOnce(&mut UserProfile)) -> UserProfile {
    create_test_user(|u| {
        u.premium_until = Some(days_from_now(30));
        overrides(u);
    })
}

pub fn days_from_now(days: i64) -> DateTime<Utc> {
    Utc::now() + Duration::days(days)
}

/// Fixed datetime for reproducible tests.
pub fn test_datetime() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2026, 1, 15)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn profile_use_cases(persistence: &Arc<InMemoryPersistence>) -> ProfileUseCases {
    let analytics = Arc::new(AnalyticsUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
    ));
    ProfileUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        analytics,
        TEST_APP_ORIGIN.to_string(),
    )
}

/// Billing wired to the dummy gateway.
pub fn billing_use_cases(
    persistence: &Arc<InMemoryPersistence>,
    email: Arc<RecordingEmailSender>,
) -> BillingUseCases {
    BillingUseCases::new(
        persistence.clone(),
        persistence.clone(),
        persistence.clone(),
        Arc::new(DummyPaymentGateway::new()),
        email,
        TEST_APP_ORIGIN.to_string(),
    )
}
