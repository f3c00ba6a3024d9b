use super::common::*;
use crate::use_cases::theme::ThemeInput;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_theme).put(update_theme))
}

async fn get_theme(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let theme = app_state.theme_use_cases.get_theme(user_id).await?;
    Ok(Json(theme))
}

async fn update_theme(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(input): Json<ThemeInput>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let theme = app_state.theme_use_cases.update_theme(user_id, input).await?;
    Ok(Json(theme))
}
