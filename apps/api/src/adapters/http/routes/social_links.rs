use super::common::*;
use crate::domain::entities::social_link::SocialPlatform;

#[derive(Deserialize)]
struct UpsertSocialLinkPayload {
    platform: SocialPlatform,
    url: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_social_links).put(upsert_social_link))
        .route("/{platform}", delete(delete_social_link))
}

async fn list_social_links(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let links = app_state
        .social_link_use_cases
        .list_social_links(user_id)
        .await?;
    Ok(Json(links))
}

async fn upsert_social_link(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<UpsertSocialLinkPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let link = app_state
        .social_link_use_cases
        .upsert_social_link(user_id, payload.platform, &payload.url)
        .await?;
    Ok(Json(link))
}

async fn delete_social_link(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(platform): Path<String>,
) -> AppResult<StatusCode> {
    let user_id = current_user(&jar, &app_state)?;
    let platform: SocialPlatform = platform
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Unknown platform: {platform}")))?;
    app_state
        .social_link_use_cases
        .delete_social_link(user_id, platform)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
