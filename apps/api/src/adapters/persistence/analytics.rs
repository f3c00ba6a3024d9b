use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_column},
    app_error::AppResult,
    domain::entities::analytics::DailyCount,
    use_cases::analytics::{AnalyticsRepo, LinkClicks, NewAnalyticsEvent},
};

#[derive(sqlx::FromRow)]
struct DailyCountDb {
    day: NaiveDate,
    kind: String,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct LinkClicksDb {
    link_id: Uuid,
    title: String,
    clicks: i64,
}

#[async_trait]
impl AnalyticsRepo for PostgresPersistence {
    async fn record_event(&self, event: &NewAnalyticsEvent) -> AppResult<()> {
        sqlx::query(
            r#"
                INSERT INTO analytics_events (id, user_id, kind, link_id, referrer)
                VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.user_id)
        .bind(event.kind.as_ref())
        .bind(event.link_id)
        .bind(&event.referrer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn daily_counts(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        let rows = sqlx::query_as::<_, DailyCountDb>(
            r#"
                SELECT (created_at AT TIME ZONE 'utc')::date AS day, kind, COUNT(*) AS count
                FROM analytics_events
                WHERE user_id = $1 AND created_at >= $2
                GROUP BY day, kind
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(DailyCount {
                    date: r.day,
                    kind: parse_column(&r.kind, "kind", user_id)?,
                    count: r.count,
                })
            })
            .collect()
    }

    async fn link_clicks(&self, user_id: Uuid, since: DateTime<Utc>) -> AppResult<Vec<LinkClicks>> {
        let rows = sqlx::query_as::<_, LinkClicksDb>(
            r#"
                SELECT l.id AS link_id, l.title, COUNT(e.id) AS clicks
                FROM analytics_events e
                JOIN links l ON l.id = e.link_id
                WHERE e.user_id = $1 AND e.kind = 'link_click' AND e.created_at >= $2
                GROUP BY l.id, l.title
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LinkClicks {
                link_id: r.link_id,
                title: r.title,
                clicks: r.clicks,
            })
            .collect())
    }
}
