use super::common::*;
use crate::use_cases::links::LinkChanges;

#[derive(Deserialize)]
struct CreateLinkPayload {
    title: String,
    url: String,
    #[serde(default)]
    is_active: Option<bool>,
}

#[derive(Deserialize)]
struct ReorderPayload {
    ids: Vec<Uuid>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_links).post(create_link))
        .route("/reorder", put(reorder_links))
        .route("/{id}", patch(update_link).delete(delete_link))
}

async fn list_links(
    State(app_state): State<AppState>,
    jar: CookieJar,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let links = app_state.link_use_cases.list_links(user_id).await?;
    Ok(Json(links))
}

async fn create_link(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CreateLinkPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let link = app_state
        .link_use_cases
        .create_link(user_id, &payload.title, &payload.url, payload.is_active)
        .await?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn update_link(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(link_id): Path<Uuid>,
    Json(changes): Json<LinkChanges>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let link = app_state
        .link_use_cases
        .update_link(user_id, link_id, changes)
        .await?;
    Ok(Json(link))
}

async fn delete_link(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Path(link_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let user_id = current_user(&jar, &app_state)?;
    app_state.link_use_cases.delete_link(user_id, link_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_links(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ReorderPayload>,
) -> AppResult<impl IntoResponse> {
    let user_id = current_user(&jar, &app_state)?;
    let links = app_state
        .link_use_cases
        .reorder_links(user_id, payload.ids)
        .await?;
    Ok(Json(links))
}
