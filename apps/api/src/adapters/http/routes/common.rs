//! Shared imports and cookie helpers for the route modules.

pub use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
};
pub use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;

pub use crate::adapters::http::app_state::AppState;
pub use crate::adapters::http::middleware::{
    ACCESS_COOKIE, EMAIL_COOKIE, REFRESH_COOKIE, SESSION_COOKIE, current_user, require_admin,
};
pub use crate::app_error::{AppError, AppResult};

fn build_cookie(name: &'static str, value: String, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Sets the access, refresh and email cookies after a successful login.
pub(crate) fn add_auth_cookies(
    jar: CookieJar,
    app_state: &AppState,
    user_id: Uuid,
    email: &str,
) -> AppResult<CookieJar> {
    let config = &app_state.config;
    let access = crate::application::jwt::issue(user_id, &config.jwt_secret, config.access_token_ttl)?;
    let refresh =
        crate::application::jwt::issue(user_id, &config.jwt_secret, config.refresh_token_ttl)?;

    let mut access_cookie = build_cookie(ACCESS_COOKIE, access, true);
    access_cookie.set_max_age(config.access_token_ttl);
    let mut refresh_cookie = build_cookie(REFRESH_COOKIE, refresh, true);
    refresh_cookie.set_max_age(config.refresh_token_ttl);
    let email_cookie = build_cookie(EMAIL_COOKIE, email.to_string(), false);

    Ok(jar.add(access_cookie).add(refresh_cookie).add(email_cookie))
}

/// Expires every cookie the API sets.
pub(crate) fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    [
        (ACCESS_COOKIE, true),
        (REFRESH_COOKIE, true),
        (EMAIL_COOKIE, false),
        (SESSION_COOKIE, true),
    ]
    .into_iter()
    .fold(jar, |jar, (name, http_only)| {
        let mut cookie = build_cookie(name, String::new(), http_only);
        cookie.set_max_age(time::Duration::seconds(0));
        jar.add(cookie)
    })
}

/// `Referer` header, if it is valid UTF-8.
pub(crate) fn referrer(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::REFERER).and_then(|v| v.to_str().ok())
}
