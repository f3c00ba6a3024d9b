use chrono::NaiveDate;

use super::common::*;
use crate::domain::entities::system_settings::SystemSettings;

#[derive(Deserialize)]
struct UsersQuery {
    search: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
struct ReportQuery {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_settings).put(update_settings))
        .route("/users", get(list_users))
        .route("/reports/financial", get(financial_report))
}

async fn get_settings(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    require_admin(&jar, &app_state).await?;
    let settings = app_state.admin_use_cases.get_settings().await?;
    Ok(Json(settings))
}

async fn update_settings(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(settings): Json<SystemSettings>,
) -> AppResult<impl IntoResponse> {
    let admin = require_admin(&jar, &app_state).await?;
    tracing::info!(admin_id = %admin.id, "Admin updating system settings");
    let saved = app_state.admin_use_cases.update_settings(settings).await?;
    Ok(Json(saved))
}

async fn list_users(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<UsersQuery>,
) -> AppResult<impl IntoResponse> {
    require_admin(&jar, &app_state).await?;
    let page = app_state
        .admin_use_cases
        .list_users(query.search.as_deref(), query.limit, query.offset)
        .await?;
    Ok(Json(page))
}

async fn financial_report(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<ReportQuery>,
) -> AppResult<impl IntoResponse> {
    require_admin(&jar, &app_state).await?;
    let report = app_state
        .admin_use_cases
        .financial_report(query.from, query.to)
        .await?;
    Ok(Json(report))
}
