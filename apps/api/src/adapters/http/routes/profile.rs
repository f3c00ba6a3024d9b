use super::common::*;
use crate::use_cases::profile::ProfilePatch;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_profile).patch(update_profile))
}

async fn get_profile(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let profile = app_state.profile_use_cases.get_profile(user_id).await?;
    Ok(Json(profile))
}

async fn update_profile(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(patch): Json<ProfilePatch>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let profile = app_state
        .profile_use_cases
        .update_profile(user_id, patch)
        .await?;
    Ok(Json(profile))
}
