use super::common::*;

#[derive(Deserialize)]
struct RequestPayload {
    email: String,
}

#[derive(Deserialize)]
struct ConsumePayload {
    token: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request", post(request))
        .route("/consume", post(consume))
        .route("/verify", get(verify))
        .route("/logout", post(logout))
}

async fn request(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<RequestPayload>,
) -> AppResult<impl IntoResponse> {
    let (jar, session_id) = ensure_login_session(jar, app_state.config.magic_link_ttl_minutes);
    app_state
        .auth_use_cases
        .request_magic_link(
            &payload.email,
            &session_id,
            app_state.config.magic_link_ttl_minutes,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, jar))
}

async fn consume(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ConsumePayload>,
) -> AppResult<(StatusCode, CookieJar)> {
    // No session cookie means the link was opened in another browser.
    let Some(session_id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        return Ok((StatusCode::UNAUTHORIZED, jar));
    };

    let Some(user) = app_state
        .auth_use_cases
        .consume_magic_link(&payload.token, &session_id)
        .await?
    else {
        return Ok((StatusCode::UNAUTHORIZED, jar));
    };

    let jar = add_auth_cookies(jar, &app_state, user.id, &user.email)?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok((StatusCode::OK, jar))
}

async fn verify(cookies: CookieJar, State(app_state): State<AppState>) -> StatusCode {
    match current_user(&cookies, &app_state) {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::UNAUTHORIZED,
    }
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    (StatusCode::OK, clear_auth_cookies(jar))
}

fn ensure_login_session(jar: CookieJar, ttl_minutes: i64) -> (CookieJar, String) {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_owned())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let cookie = Cookie::build((SESSION_COOKIE, session_id.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::minutes(ttl_minutes))
        .build();
    (jar.add(cookie), session_id)
}
