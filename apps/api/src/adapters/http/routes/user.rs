use super::common::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/delete", delete(delete_account))
}

async fn get_me(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let me = app_state.auth_use_cases.get_me(user_id).await?;
    Ok(Json(me))
}

async fn delete_account(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<(StatusCode, CookieJar)> {
    let user_id = current_user(&jar, &app_state)?;

    app_state.auth_use_cases.delete_account(user_id).await?;

    Ok((StatusCode::NO_CONTENT, clear_auth_cookies(jar)))
}
