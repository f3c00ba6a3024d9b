use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_column, user::{USER_COLUMNS, UserDb}},
    app_error::AppResult,
    use_cases::{
        admin::{AdminRepo, LiveSubscription, ReportPayment},
        user::UserProfile,
    },
};

#[derive(sqlx::FromRow)]
struct ReportPaymentDb {
    id: Uuid,
    status: String,
    value_cents: i64,
    paid_at: Option<DateTime<Utc>>,
    due_date: Option<NaiveDate>,
}

#[derive(sqlx::FromRow)]
struct LiveSubscriptionDb {
    id: Uuid,
    status: String,
    cycle: String,
    value_cents: i64,
}

/// `%term%` for ILIKE, with the pattern metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[async_trait]
impl AdminRepo for PostgresPersistence {
    async fn list_users(
        &self,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<UserProfile>, i64)> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            r#"
                SELECT COUNT(*) FROM users
                WHERE $1::text IS NULL OR email ILIKE $1 OR username ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"
                SELECT {USER_COLUMNS} FROM users
                WHERE $1::text IS NULL OR email ILIKE $1 OR username ILIKE $1
                ORDER BY created_at DESC, id
                LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, UserDb>(&sql)
            .bind(&pattern)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(UserProfile::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((users, total))
    }

    async fn report_payments(&self, from: NaiveDate, to: NaiveDate) -> AppResult<Vec<ReportPayment>> {
        let until = to.succ_opt().unwrap_or(to);
        let rows = sqlx::query_as::<_, ReportPaymentDb>(
            r#"
                SELECT id, status, value_cents, paid_at, due_date
                FROM payments
                WHERE (paid_at >= $1 AND paid_at < $2)
                   OR (due_date >= $3 AND due_date <= $4)
            "#,
        )
        .bind(day_start(from))
        .bind(day_start(until))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(ReportPayment {
                    status: parse_column(&r.status, "status", r.id)?,
                    value_cents: r.value_cents,
                    paid_at: r.paid_at,
                    due_date: r.due_date,
                })
            })
            .collect()
    }

    async fn live_subscriptions(&self) -> AppResult<Vec<LiveSubscription>> {
        let rows = sqlx::query_as::<_, LiveSubscriptionDb>(
            "SELECT id, status, cycle, value_cents FROM subscriptions WHERE status IN ('active', 'past_due')",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(LiveSubscription {
                    status: parse_column(&r.status, "status", r.id)?,
                    cycle: parse_column(&r.cycle, "cycle", r.id)?,
                    value_cents: r.value_cents,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ana"), "%ana%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
