use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        payment_status::PaymentStatus,
        subscription::{BillingCycle, SubscriptionStatus},
        system_settings::SystemSettings,
        user::UserRole,
    },
    use_cases::user::UserProfile,
};

pub const MAX_PAGE_SIZE: i64 = 100;

#[async_trait]
pub trait SettingsRepo: Send + Sync {
    /// Stored settings, or the defaults when none were saved yet.
    async fn get_settings(&self) -> AppResult<SystemSettings>;
    async fn save_settings(&self, settings: &SystemSettings) -> AppResult<SystemSettings>;
}

/// Payment fields the financial report needs.
#[derive(Debug, Clone)]
pub struct ReportPayment {
    pub status: PaymentStatus,
    pub value_cents: i64,
    pub paid_at: Option<DateTime<Utc>>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct LiveSubscription {
    pub status: SubscriptionStatus,
    pub cycle: BillingCycle,
    pub value_cents: i64,
}

#[async_trait]
pub trait AdminRepo: Send + Sync {
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<UserProfile>, i64)>;

    /// Payments whose `paid_at` or `due_date` falls in `[from, to]`.
    async fn report_payments(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<ReportPayment>>;

    /// Subscriptions currently active or past due.
    async fn live_subscriptions(&self) -> AppResult<Vec<LiveSubscription>>;
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminUserRow {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub role: UserRole,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub total_paid_cents: i64,
    pub payments_count: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<AdminUserRow>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonthlyRevenue {
    pub month: String,
    pub received_cents: i64,
    pub refunded_cents: i64,
    pub net_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Everything paid in range, including payments refunded later.
    pub received_cents: i64,
    pub refunded_cents: i64,
    pub net_cents: i64,
    pub pending_cents: i64,
    pub overdue_cents: i64,
    pub paid_count: i64,
    pub monthly: Vec<MonthlyRevenue>,
    pub active_subscriptions: i64,
    pub past_due_subscriptions: i64,
    pub mrr_cents: i64,
}

fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn month_keys(from: NaiveDate, to: NaiveDate) -> Vec<String> {
    let mut keys = Vec::new();
    let Some(mut cursor) = from.with_day(1) else {
        return keys;
    };
    while cursor <= to {
        keys.push(month_key(cursor));
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    keys
}

/// Default report window: the current month and the eleven before it.
pub fn default_report_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_of_month = today.with_day(1).unwrap_or(today);
    let from = first_of_month
        .checked_sub_months(Months::new(11))
        .unwrap_or(first_of_month);
    (from, today)
}

pub fn build_financial_report(
    from: NaiveDate,
    to: NaiveDate,
    payments: &[ReportPayment],
    subscriptions: &[LiveSubscription],
) -> FinancialReport {
    let in_range = |d: NaiveDate| d >= from && d <= to;

    let mut monthly: BTreeMap<String, MonthlyRevenue> = month_keys(from, to)
        .into_iter()
        .map(|month| {
            (
                month.clone(),
                MonthlyRevenue {
                    month,
                    ..Default::default()
                },
            )
        })
        .collect();

    let mut received = 0;
    let mut refunded = 0;
    let mut pending = 0;
    let mut overdue = 0;
    let mut paid_count = 0;

    for p in payments {
        match p.status {
            PaymentStatus::Confirmed | PaymentStatus::Received | PaymentStatus::Refunded => {
                let Some(paid_on) = p.paid_at.map(|t| t.date_naive()).filter(|d| in_range(*d))
                else {
                    continue;
                };
                received += p.value_cents;
                paid_count += 1;
                let bucket = monthly.entry(month_key(paid_on)).or_default();
                bucket.received_cents += p.value_cents;
                if p.status == PaymentStatus::Refunded {
                    refunded += p.value_cents;
                    bucket.refunded_cents += p.value_cents;
                }
            }
            PaymentStatus::Pending | PaymentStatus::Overdue => {
                if !p.due_date.is_some_and(in_range) {
                    continue;
                }
                if p.status == PaymentStatus::Pending {
                    pending += p.value_cents;
                } else {
                    overdue += p.value_cents;
                }
            }
            PaymentStatus::Deleted => {}
        }
    }

    for bucket in monthly.values_mut() {
        bucket.net_cents = bucket.received_cents - bucket.refunded_cents;
    }

    let mut active = 0;
    let mut past_due = 0;
    let mut monthly_sum = 0;
    let mut yearly_sum = 0;
    for s in subscriptions {
        match s.status {
            SubscriptionStatus::Active => {
                active += 1;
                match s.cycle {
                    BillingCycle::Monthly => monthly_sum += s.value_cents,
                    BillingCycle::Yearly => yearly_sum += s.value_cents,
                }
            }
            SubscriptionStatus::PastDue => past_due += 1,
            _ => {}
        }
    }

    FinancialReport {
        from,
        to,
        received_cents: received,
        refunded_cents: refunded,
        net_cents: received - refunded,
        pending_cents: pending,
        overdue_cents: overdue,
        paid_count,
        monthly: monthly.into_values().collect(),
        active_subscriptions: active,
        past_due_subscriptions: past_due,
        mrr_cents: monthly_sum + BillingCycle::Yearly.monthly_equivalent_cents(yearly_sum),
    }
}

#[derive(Clone)]
pub struct AdminUseCases {
    settings: Arc<dyn SettingsRepo>,
    repo: Arc<dyn AdminRepo>,
}

impl AdminUseCases {
    pub fn new(settings: Arc<dyn SettingsRepo>, repo: Arc<dyn AdminRepo>) -> Self {
        Self { settings, repo }
    }

    pub async fn get_settings(&self) -> AppResult<SystemSettings> {
        self.settings.get_settings().await
    }

    #[instrument(skip(self))]
    pub async fn update_settings(&self, settings: SystemSettings) -> AppResult<SystemSettings> {
        let settings = SystemSettings {
            currency: settings.currency.trim().to_string(),
            ..settings
        };
        settings.validate().map_err(AppError::InvalidInput)?;
        let saved = self.settings.save_settings(&settings).await?;
        tracing::info!(
            monthly = saved.monthly_price_cents,
            yearly = saved.yearly_price_cents,
            currency = %saved.currency,
            "System settings updated"
        );
        Ok(saved)
    }

    pub async fn list_users(
        &self,
        search: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> AppResult<UserPage> {
        let limit = limit.unwrap_or(50).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        let (users, total) = self.repo.list_users(search, limit, offset).await?;
        let now = Utc::now();
        let users = users
            .into_iter()
            .map(|u| AdminUserRow {
                is_premium: u.is_premium_at(now),
                id: u.id,
                email: u.email,
                username: u.username,
                role: u.role,
                premium_until: u.premium_until,
                total_paid_cents: u.total_paid_cents,
                payments_count: u.payments_count,
            })
            .collect();

        Ok(UserPage {
            users,
            total,
            limit,
            offset,
        })
    }

    #[instrument(skip(self))]
    pub async fn financial_report(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> AppResult<FinancialReport> {
        let (default_from, default_to) = default_report_range(Utc::now().date_naive());
        let from = from.unwrap_or(default_from);
        let to = to.unwrap_or(default_to);
        if from > to {
            return Err(AppError::InvalidInput("'from' must not be after 'to'".into()));
        }

        let payments = self.repo.report_payments(from, to).await?;
        let subscriptions = self.repo.live_subscriptions().await?;
        Ok(build_financial_report(from, to, &payments, &subscriptions))
    }
}
