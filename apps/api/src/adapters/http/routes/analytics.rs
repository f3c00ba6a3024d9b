use super::common::*;

#[derive(Deserialize)]
struct SummaryQuery {
    days: Option<i32>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_summary))
}

async fn get_summary(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<SummaryQuery>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let summary = app_state
        .analytics_use_cases
        .summary(user_id, query.days)
        .await?;
    Ok(Json(summary))
}
