use std::str::FromStr;

use sqlx::{PgPool, Postgres, Transaction, error::ErrorKind};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};

const MAX_JSON_LOG_LEN: usize = 200;

/// Parse JSON value to target type, logging warning on failure.
///
/// Handles NULL gracefully (returns default without logging).
/// Only logs warnings for actual parse failures (type mismatches, corruption).
///
/// # Arguments
/// * `json` - The JSON value to parse (may be Value::Null for SQL NULL)
/// * `field_name` - Name of the field being parsed (for logging)
/// * `entity_type` - Type of entity (e.g., "form", "user")
/// * `entity_id` - ID of the entity (for log filtering)
pub fn parse_json_with_fallback<T: serde::de::DeserializeOwned + Default>(
    json: &serde_json::Value,
    field_name: &str,
    entity_type: &str,
    entity_id: &str,
) -> T {
    if json.is_null() {
        return T::default();
    }

    serde_json::from_value(json.clone()).unwrap_or_else(|err| {
        let raw_str = json.to_string();
        let truncated = if raw_str.len() > MAX_JSON_LOG_LEN {
            let cut = (0..=MAX_JSON_LOG_LEN)
                .rev()
                .find(|i| raw_str.is_char_boundary(*i))
                .unwrap_or(0);
            format!("{}...", &raw_str[..cut])
        } else {
            raw_str
        };

        tracing::warn!(
            field = field_name,
            entity_type = entity_type,
            entity_id = entity_id,
            raw_json = %truncated,
            error = %err,
            "Failed to parse JSON field, using default value"
        );
        T::default()
    })
}

/// Parses a TEXT column holding an enum. A value the code doesn't know means
/// the row was written by something else, so it surfaces as a database error.
pub fn parse_column<T: FromStr>(raw: &str, column: &str, entity_id: Uuid) -> AppResult<T> {
    raw.parse().map_err(|_| {
        tracing::error!(column, value = raw, %entity_id, "Unknown enum value in database");
        AppError::Database(format!("Invalid {column} value"))
    })
}

pub mod admin;
pub mod analytics;
pub mod billing;
pub mod form;
pub mod link;
pub mod social_link;
pub mod system_settings;
pub mod theme;
pub mod user;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Locks the user row so link and form mutations of one user run one at a time.
pub(crate) async fn lock_owner(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> AppResult<()> {
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    Ok(())
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => {
                    AppError::Conflict("A record with this value already exists".into())
                }
                ErrorKind::ForeignKeyViolation => {
                    AppError::InvalidInput("Referenced record not found".into())
                }
                ErrorKind::NotNullViolation => {
                    AppError::InvalidInput("Required field is missing".into())
                }
                ErrorKind::CheckViolation => {
                    AppError::InvalidInput("Value is out of the allowed range".into())
                }
                _ => {
                    // Log the actual error for debugging, but don't expose details
                    tracing::error!(error = ?err, "Database error");
                    AppError::Database("Database operation failed".into())
                }
            },
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Database("Database operation failed".into())
            }
        }
    }
}
