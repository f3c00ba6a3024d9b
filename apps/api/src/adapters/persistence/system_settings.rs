use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::AppResult,
    domain::entities::system_settings::SystemSettings,
    use_cases::admin::SettingsRepo,
};

#[derive(sqlx::FromRow, Debug)]
struct SettingsDb {
    monthly_price_cents: i64,
    yearly_price_cents: i64,
    currency: String,
    max_links_free: i32,
    max_forms_free: i32,
    analytics_days_free: i32,
    updated_at: Option<NaiveDateTime>,
}

impl From<SettingsDb> for SystemSettings {
    fn from(r: SettingsDb) -> Self {
        SystemSettings {
            monthly_price_cents: r.monthly_price_cents,
            yearly_price_cents: r.yearly_price_cents,
            currency: r.currency,
            max_links_free: r.max_links_free,
            max_forms_free: r.max_forms_free,
            analytics_days_free: r.analytics_days_free,
            updated_at: r.updated_at,
        }
    }
}

#[async_trait]
impl SettingsRepo for PostgresPersistence {
    /// The single settings row, or the built-in defaults before an admin saved any.
    async fn get_settings(&self) -> AppResult<SystemSettings> {
        let rec = sqlx::query_as::<_, SettingsDb>(
            r#"
                SELECT monthly_price_cents, yearly_price_cents, currency, max_links_free,
                       max_forms_free, analytics_days_free, updated_at
                FROM system_settings
                WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.map(SystemSettings::from).unwrap_or_default())
    }

    async fn save_settings(&self, settings: &SystemSettings) -> AppResult<SystemSettings> {
        let rec = sqlx::query_as::<_, SettingsDb>(
            r#"
                INSERT INTO system_settings
                    (id, monthly_price_cents, yearly_price_cents, currency, max_links_free,
                     max_forms_free, analytics_days_free)
                VALUES (1, $1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE
                SET monthly_price_cents = EXCLUDED.monthly_price_cents,
                    yearly_price_cents = EXCLUDED.yearly_price_cents,
                    currency = EXCLUDED.currency,
                    max_links_free = EXCLUDED.max_links_free,
                    max_forms_free = EXCLUDED.max_forms_free,
                    analytics_days_free = EXCLUDED.analytics_days_free,
                    updated_at = now() AT TIME ZONE 'utc'
                RETURNING monthly_price_cents, yearly_price_cents, currency, max_links_free,
                          max_forms_free, analytics_days_free, updated_at
            "#,
        )
        .bind(settings.monthly_price_cents)
        .bind(settings.yearly_price_cents)
        .bind(&settings.currency)
        .bind(settings.max_links_free)
        .bind(settings.max_forms_free)
        .bind(settings.analytics_days_free)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec.into())
    }
}
