use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_column},
    app_error::{AppError, AppResult},
    domain::entities::payment_status::PaymentStatus,
    use_cases::billing::{
        BillingRepo, BillingTx, NewPayment, Payment, PendingCheckout, StatsChange, Subscription,
        SubscriptionUpdate,
    },
};

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, cycle, status, value_cents, \
     gateway_subscription_id, current_period_end, canceled_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, user_id, subscription_id, gateway_payment_id, value_cents, \
     status, invoice_url, due_date, paid_at, refunded_at, created_at";

#[derive(sqlx::FromRow, Debug)]
struct SubscriptionDb {
    id: Uuid,
    user_id: Uuid,
    cycle: String,
    status: String,
    value_cents: i64,
    gateway_subscription_id: Option<String>,
    current_period_end: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    created_at: Option<NaiveDateTime>,
    updated_at: Option<NaiveDateTime>,
}

impl TryFrom<SubscriptionDb> for Subscription {
    type Error = AppError;

    fn try_from(r: SubscriptionDb) -> AppResult<Self> {
        Ok(Subscription {
            cycle: parse_column(&r.cycle, "cycle", r.id)?,
            status: parse_column(&r.status, "status", r.id)?,
            id: r.id,
            user_id: r.user_id,
            value_cents: r.value_cents,
            gateway_subscription_id: r.gateway_subscription_id,
            current_period_end: r.current_period_end,
            canceled_at: r.canceled_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(sqlx::FromRow, Debug)]
struct PaymentDb {
    id: Uuid,
    user_id: Option<Uuid>,
    subscription_id: Option<Uuid>,
    gateway_payment_id: String,
    value_cents: i64,
    status: String,
    invoice_url: Option<String>,
    due_date: Option<NaiveDate>,
    paid_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    created_at: Option<NaiveDateTime>,
}

impl TryFrom<PaymentDb> for Payment {
    type Error = AppError;

    fn try_from(r: PaymentDb) -> AppResult<Self> {
        Ok(Payment {
            status: parse_column(&r.status, "status", r.id)?,
            id: r.id,
            user_id: r.user_id,
            subscription_id: r.subscription_id,
            gateway_payment_id: r.gateway_payment_id,
            value_cents: r.value_cents,
            invoice_url: r.invoice_url,
            due_date: r.due_date,
            paid_at: r.paid_at,
            refunded_at: r.refunded_at,
            created_at: r.created_at,
        })
    }
}

fn opt_subscription(rec: Option<SubscriptionDb>) -> AppResult<Option<Subscription>> {
    rec.map(Subscription::try_from).transpose()
}

#[async_trait]
impl BillingRepo for PostgresPersistence {
    async fn get_subscription(&self, user_id: Uuid) -> AppResult<Option<Subscription>> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = $1");
        let rec = sqlx::query_as::<_, SubscriptionDb>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        opt_subscription(rec)
    }

    async fn start_pending_subscription(&self, checkout: &PendingCheckout) -> AppResult<Subscription> {
        let mut tx = self.pool.begin().await?;

        // The WHERE clause keeps a concurrent checkout from replacing a live subscription.
        let sql = format!(
            r#"
                INSERT INTO subscriptions (id, user_id, cycle, status, value_cents, gateway_subscription_id)
                VALUES ($1, $2, $3, 'pending', $4, $5)
                ON CONFLICT (user_id) DO UPDATE
                SET cycle = EXCLUDED.cycle,
                    status = 'pending',
                    value_cents = EXCLUDED.value_cents,
                    gateway_subscription_id = EXCLUDED.gateway_subscription_id,
                    canceled_at = NULL,
                    updated_at = now() AT TIME ZONE 'utc'
                WHERE subscriptions.status NOT IN ('active', 'past_due')
                RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        let subscription: Subscription = sqlx::query_as::<_, SubscriptionDb>(&sql)
            .bind(Uuid::new_v4())
            .bind(checkout.user_id)
            .bind(checkout.cycle.as_ref())
            .bind(checkout.value_cents)
            .bind(&checkout.gateway_subscription_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::Conflict("You already have an active subscription".into()))?
            .try_into()?;

        sqlx::query(
            r#"
                INSERT INTO payments
                    (id, user_id, subscription_id, gateway_payment_id, value_cents, status, invoice_url, due_date)
                VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
                ON CONFLICT (gateway_payment_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(checkout.user_id)
        .bind(subscription.id)
        .bind(&checkout.first_payment.gateway_payment_id)
        .bind(checkout.value_cents)
        .bind(&checkout.first_payment.invoice_url)
        .bind(checkout.first_payment.due_date)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(subscription)
    }

    async fn mark_subscription_canceled(
        &self,
        subscription_id: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let sql = format!(
            r#"
                UPDATE subscriptions
                SET status = 'canceled', canceled_at = $2, updated_at = now() AT TIME ZONE 'utc'
                WHERE id = $1 AND status <> 'canceled'
                RETURNING {SUBSCRIPTION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, SubscriptionDb>(&sql)
            .bind(subscription_id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::Conflict("Subscription is already canceled".into()))?
            .try_into()
    }

    async fn list_payments(&self, user_id: Uuid) -> AppResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query_as::<_, PaymentDb>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn begin(&self) -> AppResult<Box<dyn BillingTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresBillingTx { tx }))
    }
}

pub struct PostgresBillingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BillingTx for PostgresBillingTx {
    async fn mark_event_processed(&mut self, event_id: &str, event_type: &str) -> AppResult<bool> {
        // A concurrent delivery of the same event blocks on the primary key
        // until this transaction ends, then sees the row.
        let result = sqlx::query(
            r#"
                INSERT INTO processed_webhook_events (event_id, event_type)
                VALUES ($1, $2)
                ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn lock_payment(&mut self, gateway_payment_id: &str) -> AppResult<Option<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_payment_id = $1 FOR UPDATE"
        );
        let rec = sqlx::query_as::<_, PaymentDb>(&sql)
            .bind(gateway_payment_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        rec.map(Payment::try_from).transpose()
    }

    async fn lock_subscription(&mut self, subscription_id: Uuid) -> AppResult<Option<Subscription>> {
        let sql = format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = $1 FOR UPDATE");
        let rec = sqlx::query_as::<_, SubscriptionDb>(&sql)
            .bind(subscription_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        opt_subscription(rec)
    }

    async fn lock_subscription_by_gateway_id(
        &mut self,
        gateway_subscription_id: &str,
    ) -> AppResult<Option<Subscription>> {
        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE gateway_subscription_id = $1 FOR UPDATE"
        );
        let rec = sqlx::query_as::<_, SubscriptionDb>(&sql)
            .bind(gateway_subscription_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        opt_subscription(rec)
    }

    async fn insert_payment(&mut self, payment: &NewPayment) -> AppResult<Payment> {
        let sql = format!(
            r#"
                INSERT INTO payments
                    (id, user_id, subscription_id, gateway_payment_id, value_cents, status, invoice_url, due_date)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (gateway_payment_id) DO NOTHING
                RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, PaymentDb>(&sql)
            .bind(Uuid::new_v4())
            .bind(payment.user_id)
            .bind(payment.subscription_id)
            .bind(&payment.gateway_payment_id)
            .bind(payment.value_cents)
            .bind(PaymentStatus::Pending.as_ref())
            .bind(&payment.invoice_url)
            .bind(payment.due_date)
            .fetch_optional(&mut *self.tx)
            .await?;

        // Another delivery recorded the same payment first; keep its row.
        let rec = match inserted {
            Some(rec) => rec,
            None => {
                let sql = format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_payment_id = $1 FOR UPDATE"
                );
                sqlx::query_as::<_, PaymentDb>(&sql)
                    .bind(&payment.gateway_payment_id)
                    .fetch_one(&mut *self.tx)
                    .await?
            }
        };
        rec.try_into()
    }

    async fn set_payment_status(
        &mut self,
        payment_id: Uuid,
        status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
                UPDATE payments
                SET status = $2,
                    paid_at = CASE WHEN $3 THEN COALESCE(paid_at, $5) ELSE paid_at END,
                    refunded_at = CASE WHEN $4 THEN $5 ELSE refunded_at END
                WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .bind(status.as_ref())
        .bind(status.is_paid())
        .bind(status == PaymentStatus::Refunded)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_subscription(
        &mut self,
        subscription_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
                UPDATE subscriptions
                SET status = $2, current_period_end = $3, canceled_at = $4,
                    updated_at = now() AT TIME ZONE 'utc'
                WHERE id = $1
            "#,
        )
        .bind(subscription_id)
        .bind(update.status.as_ref())
        .bind(update.current_period_end)
        .bind(update.canceled_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn apply_user_stats(&mut self, user_id: Uuid, change: &StatsChange) -> AppResult<()> {
        sqlx::query(
            r#"
                UPDATE users
                SET premium_until = COALESCE($2, premium_until),
                    total_paid_cents = total_paid_cents + $3,
                    payments_count = payments_count + $4,
                    updated_at = now() AT TIME ZONE 'utc'
                WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(change.premium_until)
        .bind(change.paid_delta_cents)
        .bind(change.payments_delta)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
