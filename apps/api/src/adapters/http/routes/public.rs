//! Visitor-facing endpoints. No session is required; every call is keyed by
//! the profile's username.

use std::collections::BTreeMap;

use axum::response::Redirect;

use super::common::*;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{username}", get(get_profile))
        .route("/{username}/links/{link_id}", get(follow_link))
        .route("/{username}/forms/{form_id}", post(submit_form))
}

async fn get_profile(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> AppResult<impl IntoResponse> {
    let profile = app_state
        .profile_use_cases
        .get_public_profile(&username, referrer(&headers))
        .await?;
    Ok(Json(profile))
}

/// Counts the click, then sends the visitor on to the link target.
async fn follow_link(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Path((username, link_id)): Path<(String, Uuid)>,
) -> AppResult<Redirect> {
    let url = app_state
        .link_use_cases
        .record_click(&username, link_id, referrer(&headers))
        .await?;
    Ok(Redirect::temporary(&url))
}

async fn submit_form(
    State(app_state): State<AppState>,
    Path((username, form_id)): Path<(String, Uuid)>,
    Json(values): Json<BTreeMap<String, serde_json::Value>>,
) -> AppResult<impl IntoResponse> {
    let submission = app_state
        .form_use_cases
        .submit_form(&username, form_id, values)
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}
