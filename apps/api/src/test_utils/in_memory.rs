//! In-memory implementations of every repository trait.
//!
//! One `InMemoryPersistence` plays all repositories so that cross-table
//! behaviour (usernames, cascades, premium checks) matches Postgres closely
//! enough for use case and route tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        analytics::{AnalyticsEventKind, DailyCount},
        form::{Form, FormSubmission},
        link::{Link, validate_reorder},
        payment_status::PaymentStatus,
        social_link::{SocialLink, SocialPlatform, sort_for_display},
        subscription::SubscriptionStatus,
        system_settings::SystemSettings,
        theme::Theme,
        user::UserRole,
    },
    use_cases::{
        admin::{AdminRepo, LiveSubscription, ReportPayment, SettingsRepo},
        analytics::{AnalyticsRepo, LinkClicks, NewAnalyticsEvent},
        billing::{
            BillingRepo, BillingTx, NewPayment, Payment, PendingCheckout, StatsChange,
            Subscription, SubscriptionUpdate,
        },
        forms::{FormDraft, FormRepo},
        links::{LinkChanges, LinkRepo, NewLink},
        profile::{ProfileFields, ProfileRepo},
        social_links::SocialLinkRepo,
        theme::ThemeRepo,
        user::{UserProfile, UserRepo},
    },
};

fn now_naive() -> chrono::NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Default, Clone)]
pub struct Store {
    users: HashMap<Uuid, UserProfile>,
    themes: HashMap<Uuid, Theme>,
    links: Vec<Link>,
    social_links: Vec<SocialLink>,
    forms: Vec<Form>,
    submissions: Vec<FormSubmission>,
    events: Vec<(NewAnalyticsEvent, DateTime<Utc>)>,
    subscriptions: Vec<Subscription>,
    payments: Vec<Payment>,
    processed_events: HashSet<String>,
    settings: Option<SystemSettings>,
}

impl Store {
    fn user_links_mut(&mut self, user_id: Uuid) -> impl Iterator<Item = &mut Link> {
        self.links.iter_mut().filter(move |l| l.user_id == user_id)
    }

    fn user_by_username(&self, username: &str) -> Option<&UserProfile> {
        let username = username.trim().to_lowercase();
        self.users
            .values()
            .find(|u| u.username.as_deref() == Some(username.as_str()))
    }
}

/// Shared in-memory state for all repository traits.
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Arc<Mutex<Store>>,
    fail_next_stats_update: Arc<AtomicBool>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_user(&self, user: UserProfile) {
        self.state.lock().await.users.insert(user.id, user);
    }

    pub async fn user(&self, user_id: Uuid) -> Option<UserProfile> {
        self.state.lock().await.users.get(&user_id).cloned()
    }

    /// Appends a link at the end of the user's list, bypassing plan limits.
    pub async fn seed_link(&self, user_id: Uuid, title: &str, is_active: bool) -> Link {
        let mut state = self.state.lock().await;
        let position = state.links.iter().filter(|l| l.user_id == user_id).count() as i32;
        let link = Link {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            url: format!("https://example.com/{}", title.to_lowercase()),
            position,
            is_active,
            clicks: 0,
            created_at: Some(now_naive()),
            updated_at: Some(now_naive()),
        };
        state.links.push(link.clone());
        link
    }

    pub async fn links_of(&self, user_id: Uuid) -> Vec<Link> {
        let mut links: Vec<Link> = self
            .state
            .lock()
            .await
            .links
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| l.position);
        links
    }

    pub async fn analytics_events(&self) -> Vec<NewAnalyticsEvent> {
        self.state
            .lock()
            .await
            .events
            .iter()
            .map(|(e, _)| e.clone())
            .collect()
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.state.lock().await.payments.clone()
    }

    /// The next `apply_user_stats` fails with a database error.
    pub async fn fail_next_stats_update(&self) {
        self.fail_next_stats_update.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Users and profiles
// ============================================================================

#[async_trait]
impl UserRepo for InMemoryPersistence {
    async fn find_or_create_by_email(&self, email: &str, role: UserRole) -> AppResult<UserProfile> {
        let mut state = self.state.lock().await;
        if let Some(user) = state.users.values_mut().find(|u| u.email == email) {
            if role.is_admin() {
                user.role = UserRole::Admin;
            }
            return Ok(user.clone());
        }
        let user = UserProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            username: None,
            display_name: None,
            bio: None,
            avatar_url: None,
            role,
            gateway_customer_id: None,
            premium_until: None,
            total_paid_cents: 0,
            payments_count: 0,
            created_at: Some(now_naive()),
            updated_at: Some(now_naive()),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn set_gateway_customer_id(&self, user_id: Uuid, customer_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let user = state.users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.gateway_customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.users.remove(&user_id);
        state.themes.remove(&user_id);
        state.links.retain(|l| l.user_id != user_id);
        state.social_links.retain(|l| l.user_id != user_id);
        let form_ids: HashSet<Uuid> = state
            .forms
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.id)
            .collect();
        state.forms.retain(|f| f.user_id != user_id);
        state.submissions.retain(|s| !form_ids.contains(&s.form_id));
        state.events.retain(|(e, _)| e.user_id != user_id);
        let sub_ids: HashSet<Uuid> = state
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();
        state.subscriptions.retain(|s| s.user_id != user_id);
        for payment in state.payments.iter_mut() {
            if payment.user_id == Some(user_id) {
                payment.user_id = None;
            }
            if payment.subscription_id.is_some_and(|id| sub_ids.contains(&id)) {
                payment.subscription_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileRepo for InMemoryPersistence {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<UserProfile>> {
        Ok(self.state.lock().await.user_by_username(username).cloned())
    }

    async fn update_profile(&self, user_id: Uuid, fields: &ProfileFields) -> AppResult<UserProfile> {
        let mut state = self.state.lock().await;
        if let Some(username) = fields.username.as_deref()
            && state
                .users
                .values()
                .any(|u| u.id != user_id && u.username.as_deref() == Some(username))
        {
            return Err(AppError::Conflict("Username is already taken".into()));
        }
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or(AppError::InvalidCredentials)?;
        user.username = fields.username.clone();
        user.display_name = fields.display_name.clone();
        user.bio = fields.bio.clone();
        user.avatar_url = fields.avatar_url.clone();
        user.updated_at = Some(now_naive());
        Ok(user.clone())
    }
}

#[async_trait]
impl ThemeRepo for InMemoryPersistence {
    async fn get_theme(&self, user_id: Uuid) -> AppResult<Option<Theme>> {
        Ok(self.state.lock().await.themes.get(&user_id).cloned())
    }

    async fn save_theme(&self, user_id: Uuid, theme: &Theme) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::InvalidCredentials);
        }
        state.themes.insert(user_id, theme.clone());
        Ok(())
    }
}

// ============================================================================
// Links
// ============================================================================

#[async_trait]
impl LinkRepo for InMemoryPersistence {
    async fn list_links(&self, user_id: Uuid) -> AppResult<Vec<Link>> {
        Ok(self.links_of(user_id).await)
    }

    async fn create_link(
        &self,
        user_id: Uuid,
        link: &NewLink,
        max_links: Option<i64>,
    ) -> AppResult<Link> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::InvalidCredentials);
        }
        let count = state.links.iter().filter(|l| l.user_id == user_id).count() as i64;
        if let Some(max) = max_links
            && count >= max
        {
            return Err(AppError::LimitReached(format!(
                "The free plan allows up to {max} links"
            )));
        }
        let link = Link {
            id: Uuid::new_v4(),
            user_id,
            title: link.title.clone(),
            url: link.url.clone(),
            position: count as i32,
            is_active: link.is_active,
            clicks: 0,
            created_at: Some(now_naive()),
            updated_at: Some(now_naive()),
        };
        state.links.push(link.clone());
        Ok(link)
    }

    async fn update_link(
        &self,
        user_id: Uuid,
        link_id: Uuid,
        changes: &LinkChanges,
    ) -> AppResult<Link> {
        let mut state = self.state.lock().await;
        let link = state
            .user_links_mut(user_id)
            .find(|l| l.id == link_id)
            .ok_or(AppError::NotFound)?;
        if let Some(title) = &changes.title {
            link.title = title.clone();
        }
        if let Some(url) = &changes.url {
            link.url = url.clone();
        }
        if let Some(is_active) = changes.is_active {
            link.is_active = is_active;
        }
        link.updated_at = Some(now_naive());
        Ok(link.clone())
    }

    async fn delete_link(&self, user_id: Uuid, link_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let index = state
            .links
            .iter()
            .position(|l| l.id == link_id && l.user_id == user_id)
            .ok_or(AppError::NotFound)?;
        let removed = state.links.remove(index);
        for link in state.user_links_mut(user_id) {
            if link.position > removed.position {
                link.position -= 1;
            }
        }
        Ok(())
    }

    async fn reorder_links(&self, user_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Link>> {
        {
            let mut state = self.state.lock().await;
            let current: Vec<Uuid> = state
                .links
                .iter()
                .filter(|l| l.user_id == user_id)
                .map(|l| l.id)
                .collect();
            validate_reorder(&current, ids).map_err(|e| {
                AppError::Conflict(format!("Links changed while reordering ({e}), reload and retry"))
            })?;
            for link in state.user_links_mut(user_id) {
                if let Some(index) = ids.iter().position(|id| *id == link.id) {
                    link.position = index as i32;
                }
            }
        }
        Ok(self.links_of(user_id).await)
    }

    async fn find_public_link(&self, username: &str, link_id: Uuid) -> AppResult<Option<Link>> {
        let state = self.state.lock().await;
        let Some(owner) = state.user_by_username(username) else {
            return Ok(None);
        };
        Ok(state
            .links
            .iter()
            .find(|l| l.id == link_id && l.user_id == owner.id && l.is_active)
            .cloned())
    }

    async fn increment_clicks(&self, link_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if let Some(link) = state.links.iter_mut().find(|l| l.id == link_id) {
            link.clicks += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl SocialLinkRepo for InMemoryPersistence {
    async fn list_social_links(&self, user_id: Uuid) -> AppResult<Vec<SocialLink>> {
        let mut links: Vec<SocialLink> = self
            .state
            .lock()
            .await
            .social_links
            .iter()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        sort_for_display(&mut links);
        Ok(links)
    }

    async fn upsert_social_link(
        &self,
        user_id: Uuid,
        platform: SocialPlatform,
        url: &str,
    ) -> AppResult<SocialLink> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .social_links
            .iter_mut()
            .find(|l| l.user_id == user_id && l.platform == platform)
        {
            existing.url = url.to_string();
            existing.updated_at = Some(now_naive());
            return Ok(existing.clone());
        }
        let link = SocialLink {
            id: Uuid::new_v4(),
            user_id,
            platform,
            url: url.to_string(),
            created_at: Some(now_naive()),
            updated_at: Some(now_naive()),
        };
        state.social_links.push(link.clone());
        Ok(link)
    }

    async fn delete_social_link(&self, user_id: Uuid, platform: SocialPlatform) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.social_links.len();
        state
            .social_links
            .retain(|l| !(l.user_id == user_id && l.platform == platform));
        Ok(state.social_links.len() < before)
    }
}

// ============================================================================
// Forms
// ============================================================================

#[async_trait]
impl FormRepo for InMemoryPersistence {
    async fn list_forms(&self, user_id: Uuid) -> AppResult<Vec<Form>> {
        Ok(self
            .state
            .lock()
            .await
            .forms
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<Option<Form>> {
        Ok(self
            .state
            .lock()
            .await
            .forms
            .iter()
            .find(|f| f.id == form_id && f.user_id == user_id)
            .cloned())
    }

    async fn create_form(
        &self,
        user_id: Uuid,
        draft: &FormDraft,
        max_forms: Option<i64>,
    ) -> AppResult<Form> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::InvalidCredentials);
        }
        let count = state.forms.iter().filter(|f| f.user_id == user_id).count() as i64;
        if let Some(max) = max_forms
            && count >= max
        {
            return Err(AppError::LimitReached(format!(
                "The free plan allows up to {max} forms"
            )));
        }
        let form = Form {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            fields: draft.fields.clone(),
            is_active: draft.is_active,
            notify_owner: draft.notify_owner,
            created_at: Some(now_naive()),
            updated_at: Some(now_naive()),
        };
        state.forms.push(form.clone());
        Ok(form)
    }

    async fn update_form(&self, form: &Form) -> AppResult<Form> {
        let mut state = self.state.lock().await;
        let stored = state
            .forms
            .iter_mut()
            .find(|f| f.id == form.id && f.user_id == form.user_id)
            .ok_or(AppError::NotFound)?;
        *stored = Form {
            updated_at: Some(now_naive()),
            ..form.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_form(&self, user_id: Uuid, form_id: Uuid) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.forms.len();
        state
            .forms
            .retain(|f| !(f.id == form_id && f.user_id == user_id));
        let deleted = state.forms.len() < before;
        if deleted {
            state.submissions.retain(|s| s.form_id != form_id);
        }
        Ok(deleted)
    }

    async fn find_public_form(&self, username: &str, form_id: Uuid) -> AppResult<Option<Form>> {
        let state = self.state.lock().await;
        let Some(owner) = state.user_by_username(username) else {
            return Ok(None);
        };
        Ok(state
            .forms
            .iter()
            .find(|f| f.id == form_id && f.user_id == owner.id && f.is_active)
            .cloned())
    }

    async fn insert_submission(
        &self,
        form_id: Uuid,
        values: &BTreeMap<String, String>,
    ) -> AppResult<FormSubmission> {
        let submission = FormSubmission {
            id: Uuid::new_v4(),
            form_id,
            values: values.clone(),
            created_at: Some(now_naive()),
        };
        self.state.lock().await.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn list_submissions(
        &self,
        form_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<FormSubmission>, i64)> {
        let state = self.state.lock().await;
        // Insertion order is creation order; newest first.
        let all: Vec<&FormSubmission> = state
            .submissions
            .iter()
            .rev()
            .filter(|s| s.form_id == form_id)
            .collect();
        let total = all.len() as i64;
        let page = all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

// ============================================================================
// Analytics, settings and admin
// ============================================================================

#[async_trait]
impl AnalyticsRepo for InMemoryPersistence {
    async fn record_event(&self, event: &NewAnalyticsEvent) -> AppResult<()> {
        self.state
            .lock()
            .await
            .events
            .push((event.clone(), Utc::now()));
        Ok(())
    }

    async fn daily_counts(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<(NaiveDate, AnalyticsEventKind), i64> = HashMap::new();
        for (event, at) in &state.events {
            if event.user_id == user_id && *at >= since {
                *counts.entry((at.date_naive(), event.kind)).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|((date, kind), count)| DailyCount { date, kind, count })
            .collect())
    }

    async fn link_clicks(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<LinkClicks>> {
        let state = self.state.lock().await;
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for (event, at) in &state.events {
            if event.user_id == user_id
                && event.kind == AnalyticsEventKind::LinkClick
                && *at >= since
                && let Some(link_id) = event.link_id
            {
                *counts.entry(link_id).or_default() += 1;
            }
        }
        Ok(state
            .links
            .iter()
            .filter_map(|l| {
                counts.get(&l.id).map(|clicks| LinkClicks {
                    link_id: l.id,
                    title: l.title.clone(),
                    clicks: *clicks,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SettingsRepo for InMemoryPersistence {
    async fn get_settings(&self) -> AppResult<SystemSettings> {
        Ok(self
            .state
            .lock()
            .await
            .settings
            .clone()
            .unwrap_or_default())
    }

    async fn save_settings(&self, settings: &SystemSettings) -> AppResult<SystemSettings> {
        let saved = SystemSettings {
            updated_at: Some(now_naive()),
            ..settings.clone()
        };
        self.state.lock().await.settings = Some(saved.clone());
        Ok(saved)
    }
}

#[async_trait]
impl AdminRepo for InMemoryPersistence {
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<UserProfile>, i64)> {
        let state = self.state.lock().await;
        let term = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let mut users: Vec<&UserProfile> = state
            .users
            .values()
            .filter(|u| match &term {
                None => true,
                Some(term) => {
                    u.email.to_lowercase().contains(term)
                        || u.username.as_deref().is_some_and(|n| n.contains(term))
                }
            })
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        let total = users.len() as i64;
        let page = users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn report_payments(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<ReportPayment>> {
        let in_range = |d: NaiveDate| d >= from && d <= to;
        Ok(self
            .state
            .lock()
            .await
            .payments
            .iter()
            .filter(|p| {
                p.paid_at.is_some_and(|t| in_range(t.date_naive()))
                    || p.due_date.is_some_and(in_range)
            })
            .map(|p| ReportPayment {
                status: p.status,
                value_cents: p.value_cents,
                paid_at: p.paid_at,
                due_date: p.due_date,
            })
            .collect())
    }

    async fn live_subscriptions(&self) -> AppResult<Vec<LiveSubscription>> {
        Ok(self
            .state
            .lock()
            .await
            .subscriptions
            .iter()
            .filter(|s| s.status.is_live())
            .map(|s| LiveSubscription {
                status: s.status,
                cycle: s.cycle,
                value_cents: s.value_cents,
            })
            .collect())
    }
}

// ============================================================================
// Billing
// ============================================================================

#[async_trait]
impl BillingRepo for InMemoryPersistence {
    async fn get_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .state
            .lock()
            .await
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id)
            .cloned())
    }

    async fn start_pending_subscription(&self, checkout: &PendingCheckout) -> AppResult<Subscription> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let existing = state
            .subscriptions
            .iter()
            .position(|s| s.user_id == checkout.user_id);
        let subscription = match existing {
            Some(index) => {
                let existing = &mut state.subscriptions[index];
                if existing.status.is_live() {
                    return Err(AppError::Conflict(
                        "You already have an active subscription".into(),
                    ));
                }
                existing.cycle = checkout.cycle;
                existing.status = SubscriptionStatus::Pending;
                existing.value_cents = checkout.value_cents;
                existing.gateway_subscription_id = Some(checkout.gateway_subscription_id.clone());
                existing.canceled_at = None;
                existing.updated_at = Some(now.naive_utc());
                existing.clone()
            }
            None => {
                let subscription = Subscription {
                    id: Uuid::new_v4(),
                    user_id: checkout.user_id,
                    cycle: checkout.cycle,
                    status: SubscriptionStatus::Pending,
                    value_cents: checkout.value_cents,
                    gateway_subscription_id: Some(checkout.gateway_subscription_id.clone()),
                    current_period_end: None,
                    canceled_at: None,
                    created_at: Some(now.naive_utc()),
                    updated_at: Some(now.naive_utc()),
                };
                state.subscriptions.push(subscription.clone());
                subscription
            }
        };

        let first = &checkout.first_payment;
        if !state
            .payments
            .iter()
            .any(|p| p.gateway_payment_id == first.gateway_payment_id)
        {
            state.payments.push(Payment {
                id: Uuid::new_v4(),
                user_id: Some(checkout.user_id),
                subscription_id: Some(subscription.id),
                gateway_payment_id: first.gateway_payment_id.clone(),
                value_cents: checkout.value_cents,
                status: PaymentStatus::Pending,
                invoice_url: first.invoice_url.clone(),
                due_date: first.due_date,
                paid_at: None,
                refunded_at: None,
                created_at: Some(now.naive_utc()),
            });
        }
        Ok(subscription)
    }

    async fn mark_subscription_canceled(
        &self,
        subscription_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let mut state = self.state.lock().await;
        let subscription = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id && s.status != SubscriptionStatus::Canceled)
            .ok_or_else(|| AppError::Conflict("Subscription is already canceled".into()))?;
        subscription.status = SubscriptionStatus::Canceled;
        subscription.canceled_at = Some(at);
        subscription.updated_at = Some(now_naive());
        Ok(subscription.clone())
    }

    async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .iter()
            .rev()
            .filter(|p| p.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn begin(&self) -> AppResult<Box<dyn BillingTx>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryBillingTx {
            guard,
            staged,
            fail_next_stats_update: self.fail_next_stats_update.clone(),
        }))
    }
}

/// Holds the store lock for the whole unit of work and writes a staged copy
/// back on commit, so a dropped transaction leaves no trace.
pub struct InMemoryBillingTx {
    guard: OwnedMutexGuard<Store>,
    staged: Store,
    fail_next_stats_update: Arc<AtomicBool>,
}

#[async_trait]
impl BillingTx for InMemoryBillingTx {
    async fn mark_event_processed(&mut self, event_id: &str, _event_type: &str) -> AppResult<bool> {
        Ok(self.staged.processed_events.insert(event_id.to_string()))
    }

    async fn lock_payment(&mut self, gateway_payment_id: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .staged
            .payments
            .iter()
            .find(|p| p.gateway_payment_id == gateway_payment_id)
            .cloned())
    }

    async fn lock_subscription(&mut self, subscription_id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self
            .staged
            .subscriptions
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn lock_subscription_by_gateway_id(
        &mut self,
        gateway_subscription_id: &str,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .staged
            .subscriptions
            .iter()
            .find(|s| s.gateway_subscription_id.as_deref() == Some(gateway_subscription_id))
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment> {
        if let Some(existing) = self
            .staged
            .payments
            .iter()
            .find(|p| p.gateway_payment_id == payment.gateway_payment_id)
        {
            return Ok(existing.clone());
        }
        let payment = Payment {
            id: Uuid::new_v4(),
            user_id: Some(payment.user_id),
            subscription_id: Some(payment.subscription_id),
            gateway_payment_id: payment.gateway_payment_id.clone(),
            value_cents: payment.value_cents,
            status: PaymentStatus::Pending,
            invoice_url: payment.invoice_url.clone(),
            due_date: payment.due_date,
            paid_at: None,
            refunded_at: None,
            created_at: Some(now_naive()),
        };
        self.staged.payments.push(payment.clone());
        Ok(payment)
    }

    async fn set_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        let payment = self
            .staged
            .payments
            .iter_mut()
            .find(|p| p.id == payment_id)
            .ok_or(AppError::NotFound)?;
        payment.status = status;
        if status.is_paid() && payment.paid_at.is_none() {
            payment.paid_at = Some(at);
        }
        if status == PaymentStatus::Refunded {
            payment.refunded_at = Some(at);
        }
        Ok(())
    }

    async fn update_subscription(
        &mut self,
        subscription_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<()> {
        let subscription = self
            .staged
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or(AppError::NotFound)?;
        subscription.status = update.status;
        subscription.current_period_end = update.current_period_end;
        subscription.canceled_at = update.canceled_at;
        subscription.updated_at = Some(now_naive());
        Ok(())
    }

    async fn apply_user_stats(&mut self, user_id: Uuid, change: &StatsChange) -> AppResult<()> {
        if self.fail_next_stats_update.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("simulated failure".into()));
        }
        if let Some(user) = self.staged.users.get_mut(&user_id) {
            if change.premium_until.is_some() {
                user.premium_until = change.premium_until;
            }
            user.total_paid_cents += change.paid_delta_cents;
            user.payments_count += change.payments_delta;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let InMemoryBillingTx {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_user;

    #[tokio::test]
    async fn dropped_billing_tx_discards_changes() {
        let persistence = InMemoryPersistence::new();
        {
            let mut tx = persistence.begin().await.unwrap();
            assert!(tx.mark_event_processed("evt_1", "PAYMENT_CREATED").await.unwrap());
        }
        let mut tx = persistence.begin().await.unwrap();
        assert!(tx.mark_event_processed("evt_1", "PAYMENT_CREATED").await.unwrap());
        tx.commit().await.unwrap();

        let mut tx = persistence.begin().await.unwrap();
        assert!(!tx.mark_event_processed("evt_1", "PAYMENT_CREATED").await.unwrap());
    }

    #[tokio::test]
    async fn deleting_a_link_keeps_positions_dense() {
        let persistence = InMemoryPersistence::new();
        let user = create_test_user(|_| {});
        let user_id = user.id;
        persistence.insert_user(user).await;
        let a = persistence.seed_link(user_id, "A", true).await;
        persistence.seed_link(user_id, "B", true).await;
        persistence.seed_link(user_id, "C", true).await;

        persistence.delete_link(user_id, a.id).await.unwrap();

        let links = persistence.links_of(user_id).await;
        let positions: Vec<i32> = links.iter().map(|l| l.position).collect();
        assert_eq!(positions, vec![0, 1]);
        assert_eq!(links[0].title, "B");
    }
}
