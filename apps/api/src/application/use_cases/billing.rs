use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        email_templates,
        ports::payment_gateway::{
            CustomerId, GatewayPayment, NewGatewaySubscription, PaymentGateway,
        },
    },
    domain::entities::{
        gateway_event::{GatewayEventKind, UserStatsEffect, plan_transition},
        payment_status::PaymentStatus,
        subscription::{BillingCycle, SubscriptionStatus},
    },
    use_cases::{
        admin::SettingsRepo,
        user::{EmailSender, UserRepo},
    },
};

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub value_cents: i64,
    pub gateway_subscription_id: Option<String>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: Uuid,
    /// Cleared when the user deletes their account; the row stays for reporting.
    pub user_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub gateway_payment_id: String,
    pub value_cents: i64,
    pub status: PaymentStatus,
    pub invoice_url: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub gateway_payment_id: String,
    pub value_cents: i64,
    pub invoice_url: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// A checkout the gateway accepted, to be stored as a pending subscription
/// with its first pending payment.
#[derive(Debug, Clone)]
pub struct PendingCheckout {
    pub user_id: Uuid,
    pub cycle: BillingCycle,
    pub value_cents: i64,
    pub gateway_subscription_id: String,
    pub first_payment: GatewayPayment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Change to the denormalized billing columns on the user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsChange {
    pub premium_until: Option<DateTime<Utc>>,
    pub paid_delta_cents: i64,
    pub payments_delta: i32,
}

// ============================================================================
// Repository
// ============================================================================

#[async_trait]
pub trait BillingRepo: Send + Sync {
    async fn get_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>>;

    /// Upserts the user's subscription as pending with the new gateway ids and
    /// inserts the first payment, in one transaction.
    async fn start_pending_subscription(&self, checkout: &PendingCheckout) -> AppResult<Subscription>;

    /// Cancels a pending, active or past-due subscription. `Conflict` when
    /// it was canceled in the meantime.
    async fn mark_subscription_canceled(
        &self,
        subscription_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Subscription>;

    async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>>;

    async fn begin(&self) -> AppResult<Box<dyn BillingTx>>;
}

/// One webhook's unit of work. Rows returned by the `lock_*` methods stay
/// locked until `commit`; dropping the value rolls everything back.
#[async_trait]
pub trait BillingTx: Send {
    /// False when the event id was processed before.
    async fn mark_event_processed(&mut self, event_id: &str, event_type: &str) -> AppResult<bool>;
    async fn lock_payment(&mut self, gateway_payment_id: &str) -> AppResult<Option<Payment>>;
    async fn lock_subscription(&mut self, subscription_id: Uuid) -> AppResult<Option<Subscription>>;
    async fn lock_subscription_by_gateway_id(
        &mut self,
        gateway_subscription_id: &str,
    ) -> AppResult<Option<Subscription>>;
    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment>;
    /// Sets `paid_at` on paid states and `refunded_at` on refunds.
    async fn set_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
    async fn update_subscription(
        &mut self,
        subscription_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<()>;
    async fn apply_user_stats(&mut self, user_id: Uuid, change: &StatsChange) -> AppResult<()>;
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

// ============================================================================
// Webhook contract
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub id: String,
    pub event: String,
    pub payment: WebhookPaymentData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPaymentData {
    pub id: String,
    #[serde(default)]
    pub subscription: Option<String>,
    pub value_cents: i64,
    #[serde(default)]
    pub external_reference: Option<String>,
    #[serde(default)]
    pub invoice_url: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// Event id seen before
    Duplicate,
    /// Event type we don't handle
    Ignored,
    /// No matching payment or subscription
    Orphan,
    /// Out of order or repeated transition
    Stale,
    /// Renewal invoice stored as pending
    Recorded,
    Applied,
    /// Payment credited and subscription active
    Activated,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Prices {
    pub monthly_price_cents: i64,
    pub yearly_price_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionOverview {
    pub subscription: Option<Subscription>,
    pub is_premium: bool,
    pub premium_until: Option<DateTime<Utc>>,
    pub prices: Prices,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub subscription: Subscription,
    pub checkout_url: Option<String>,
}

// ============================================================================
// Use cases
// ============================================================================

#[derive(Clone)]
pub struct BillingUseCases {
    repo: Arc<dyn BillingRepo>,
    users: Arc<dyn UserRepo>,
    settings: Arc<dyn SettingsRepo>,
    gateway: Arc<dyn PaymentGateway>,
    email: Arc<dyn EmailSender>,
    app_origin: String,
}

impl BillingUseCases {
    pub fn new(
        repo: Arc<dyn BillingRepo>,
        users: Arc<dyn UserRepo>,
        settings: Arc<dyn SettingsRepo>,
        gateway: Arc<dyn PaymentGateway>,
        email: Arc<dyn EmailSender>,
        app_origin: String,
    ) -> Self {
        Self {
            repo,
            users,
            settings,
            gateway,
            email,
            app_origin,
        }
    }

    pub async fn get_subscription(&self, user_id: Uuid) -> AppResult<SubscriptionOverview> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;
        let settings = self.settings.get_settings().await?;
        let subscription = self.repo.get_subscription(user_id).await?;

        Ok(SubscriptionOverview {
            subscription,
            is_premium: user.is_premium(),
            premium_until: user.premium_until,
            prices: Prices {
                monthly_price_cents: settings.monthly_price_cents,
                yearly_price_cents: settings.yearly_price_cents,
                currency: settings.currency,
            },
        })
    }

    pub async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        self.repo.list_payments(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn start_checkout(
        &self,
        user_id: Uuid,
        cycle: BillingCycle,
    ) -> AppResult<CheckoutResponse> {
        let existing = self.repo.get_subscription(user_id).await?;
        if existing.as_ref().is_some_and(|s| s.status.is_live()) {
            return Err(AppError::Conflict(
                "You already have an active subscription".into(),
            ));
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let customer_id = match user.gateway_customer_id.as_deref() {
            Some(id) => CustomerId::new(id),
            None => {
                let id = self
                    .gateway
                    .create_customer(&user.email, user.display_name.as_deref())
                    .await?;
                self.users
                    .set_gateway_customer_id(user_id, id.as_str())
                    .await?;
                id
            }
        };

        // An abandoned checkout still has an open charge at the gateway.
        if let Some(previous) = existing.as_ref().filter(|s| s.status == SubscriptionStatus::Pending)
            && let Some(gateway_id) = previous.gateway_subscription_id.as_deref()
            && let Err(e) = self.gateway.cancel_subscription(gateway_id).await
        {
            tracing::warn!(error = %e, gateway_id, "Failed to cancel abandoned checkout");
        }

        let settings = self.settings.get_settings().await?;
        let value_cents = settings.price_for(cycle);
        let created = self
            .gateway
            .create_subscription(&NewGatewaySubscription {
                customer_id,
                cycle,
                value_cents,
                currency: settings.currency.clone(),
                description: format!("Premium ({cycle})"),
                external_reference: user_id.to_string(),
            })
            .await?;

        let checkout_url = created.first_payment.invoice_url.clone();
        let subscription = self
            .repo
            .start_pending_subscription(&PendingCheckout {
                user_id,
                cycle,
                value_cents,
                gateway_subscription_id: created.gateway_subscription_id,
                first_payment: created.first_payment,
            })
            .await?;

        tracing::info!(%user_id, %cycle, value_cents, "Checkout started");
        Ok(CheckoutResponse {
            subscription,
            checkout_url,
        })
    }

    /// Stops future charges. Paid time stays: `premium_until` is untouched.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(&self, user_id: Uuid) -> AppResult<Subscription> {
        let subscription = self
            .repo
            .get_subscription(user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if !subscription.status.can_cancel() {
            return Err(AppError::Conflict("Subscription is already canceled".into()));
        }

        if let Some(gateway_id) = subscription.gateway_subscription_id.as_deref() {
            self.gateway.cancel_subscription(gateway_id).await?;
        }

        let canceled = self
            .repo
            .mark_subscription_canceled(subscription.id, Utc::now())
            .await?;
        tracing::info!(%user_id, subscription_id = %canceled.id, "Subscription canceled");
        Ok(canceled)
    }

    /// Applies one gateway notification. The body must already be
    /// authenticated. Database errors propagate so the gateway retries;
    /// everything else is acknowledged with an outcome.
    #[instrument(skip(self, body))]
    pub async fn process_webhook(&self, body: &str) -> AppResult<WebhookOutcome> {
        let payload: WebhookPayload = serde_json::from_str(body)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {e}")))?;
        if payload.id.trim().is_empty() || payload.payment.id.trim().is_empty() {
            return Err(AppError::InvalidInput("Webhook event and payment ids are required".into()));
        }
        if payload.payment.value_cents < 0 {
            return Err(AppError::InvalidInput("value_cents must not be negative".into()));
        }

        let Ok(kind) = payload.event.parse::<GatewayEventKind>() else {
            tracing::info!(event_id = %payload.id, event_type = %payload.event, "Ignoring unhandled webhook event");
            return Ok(WebhookOutcome::Ignored);
        };

        let (outcome, receipt) = self.reconcile(kind, &payload).await?;
        tracing::info!(
            event_id = %payload.id,
            event_type = %payload.event,
            gateway_payment_id = %payload.payment.id,
            outcome = ?outcome,
            "Webhook processed"
        );

        if let Some(receipt) = receipt {
            self.send_receipt(receipt).await;
        }
        Ok(outcome)
    }

    async fn reconcile(
        &self,
        kind: GatewayEventKind,
        payload: &WebhookPayload,
    ) -> AppResult<(WebhookOutcome, Option<Receipt>)> {
        let mut tx = self.repo.begin().await?;

        if !tx.mark_event_processed(&payload.id, &payload.event).await? {
            return Ok((WebhookOutcome::Duplicate, None));
        }

        let payment = match tx.lock_payment(&payload.payment.id).await? {
            Some(payment) => payment,
            None => {
                let outcome = self.record_new_payment(tx.as_mut(), kind, payload).await?;
                tx.commit().await?;
                return Ok((outcome, None));
            }
        };

        let subscription = match payment.subscription_id {
            Some(id) => tx.lock_subscription(id).await?,
            None => None,
        };
        let Some(subscription) = subscription else {
            tracing::warn!(payment_id = %payment.id, "Payment has no subscription");
            tx.commit().await?;
            return Ok((WebhookOutcome::Orphan, None));
        };

        let Some(plan) = plan_transition(kind, payment.status, subscription.status) else {
            tracing::info!(
                payment_id = %payment.id,
                payment_status = %payment.status,
                event_type = %kind,
                "Stale webhook transition"
            );
            tx.commit().await?;
            return Ok((WebhookOutcome::Stale, None));
        };

        let now = Utc::now();
        tx.set_payment_status(payment.id, plan.payment_status, now)
            .await?;

        let period_end = if plan.extend_period {
            let base = subscription
                .current_period_end
                .filter(|end| *end > now)
                .unwrap_or(now);
            Some(subscription.cycle.advance(base))
        } else {
            subscription.current_period_end
        };

        if plan.subscription_status.is_some() || plan.extend_period {
            let status = plan.subscription_status.unwrap_or(subscription.status);
            let canceled_at = if status == SubscriptionStatus::Canceled {
                subscription.canceled_at.or(Some(now))
            } else {
                subscription.canceled_at
            };
            tx.update_subscription(
                subscription.id,
                &SubscriptionUpdate {
                    status,
                    current_period_end: period_end,
                    canceled_at,
                },
            )
            .await?;
        }

        let mut receipt = None;
        match plan.stats {
            UserStatsEffect::Credit => {
                tx.apply_user_stats(
                    subscription.user_id,
                    &StatsChange {
                        premium_until: period_end,
                        paid_delta_cents: payment.value_cents,
                        payments_delta: 1,
                    },
                )
                .await?;
                receipt = Some(Receipt {
                    user_id: subscription.user_id,
                    value_cents: payment.value_cents,
                    premium_until: period_end,
                });
            }
            UserStatsEffect::Refund => {
                tx.apply_user_stats(
                    subscription.user_id,
                    &StatsChange {
                        premium_until: Some(now),
                        paid_delta_cents: -payment.value_cents,
                        payments_delta: 0,
                    },
                )
                .await?;
            }
            UserStatsEffect::None => {}
        }

        tx.commit().await?;

        let outcome = if receipt.is_some() {
            WebhookOutcome::Activated
        } else {
            WebhookOutcome::Applied
        };
        Ok((outcome, receipt))
    }

    /// Unknown payment: a renewal invoice when it is `PAYMENT_CREATED` for a
    /// subscription we know, an orphan otherwise.
    async fn record_new_payment(
        &self,
        tx: &mut dyn BillingTx,
        kind: GatewayEventKind,
        payload: &WebhookPayload,
    ) -> AppResult<WebhookOutcome> {
        let data = &payload.payment;
        let subscription = match (kind, data.subscription.as_deref()) {
            (GatewayEventKind::PaymentCreated, Some(gateway_subscription_id)) => {
                tx.lock_subscription_by_gateway_id(gateway_subscription_id)
                    .await?
            }
            _ => None,
        };

        let Some(subscription) = subscription else {
            tracing::warn!(
                event_id = %payload.id,
                gateway_payment_id = %data.id,
                external_reference = ?data.external_reference,
                "Webhook for unknown payment"
            );
            return Ok(WebhookOutcome::Orphan);
        };

        let payment = tx
            .insert_payment(&NewPayment {
                user_id: subscription.user_id,
                subscription_id: subscription.id,
                gateway_payment_id: data.id.clone(),
                value_cents: data.value_cents,
                invoice_url: data.invoice_url.clone(),
                due_date: data.due_date,
            })
            .await?;
        tracing::info!(payment_id = %payment.id, subscription_id = %subscription.id, "Renewal invoice recorded");
        Ok(WebhookOutcome::Recorded)
    }

    async fn send_receipt(&self, receipt: Receipt) {
        let user = match self.users.get_by_id(receipt.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %receipt.user_id, "Failed to load user for receipt");
                return;
            }
        };
        let currency = match self.settings.get_settings().await {
            Ok(settings) => settings.currency,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings for receipt");
                return;
            }
        };

        let (subject, html) = email_templates::payment_receipt_email(
            &self.app_origin,
            receipt.value_cents,
            &currency,
            receipt.premium_until,
        );
        if let Err(e) = self.email.send(&user.email, &subject, &html).await {
            tracing::warn!(error = %e, user_id = %user.id, "Failed to send payment receipt");
        }
    }
}

struct Receipt {
    user_id: Uuid,
    value_cents: i64,
    premium_until: Option<DateTime<Utc>>,
}
