use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
    use_cases::user::UserProfile,
};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";
pub const EMAIL_COOKIE: &str = "user_email";
pub const SESSION_COOKIE: &str = "login_session";

pub async fn rate_limit_middleware(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Only trust forwarded headers if explicitly configured (when behind a reverse proxy)
    let ip = if app_state.config.trust_proxy {
        forwarded_ip(&request).unwrap_or_else(|| addr.ip().to_string())
    } else {
        addr.ip().to_string()
    };
    let email = cookies.get(EMAIL_COOKIE).map(|c| c.value().to_owned());

    tracing::debug!(
        trust_proxy = app_state.config.trust_proxy,
        connect_ip = %addr.ip(),
        using_ip = %ip,
        email = ?email,
        "Rate limiting request"
    );

    app_state.rate_limiter.check(&ip, email.as_deref()).await?;

    // Preserve cookie jar for downstream extractors.
    request.extensions_mut().insert(cookies);

    Ok(next.run(request).await)
}

fn forwarded_ip(req: &Request) -> Option<String> {
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(val) = forwarded.to_str()
        && let Some(first) = val.split(',').next()
    {
        let trimmed = first.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    if let Some(real) = req.headers().get("x-real-ip")
        && let Ok(val) = real.to_str()
        && !val.trim().is_empty()
    {
        return Some(val.trim().to_string());
    }
    None
}

/// User id from a valid `access_token` cookie.
pub fn current_user(jar: &CookieJar, app_state: &AppState) -> AppResult<Uuid> {
    let access_cookie = jar.get(ACCESS_COOKIE).ok_or(AppError::InvalidCredentials)?;
    let claims = jwt::verify(access_cookie.value(), &app_state.config.jwt_secret)?;
    claims.user_id()
}

/// The signed-in user, who must hold the admin role. The role is read from
/// the database on every call so a demotion takes effect immediately.
pub async fn require_admin(jar: &CookieJar, app_state: &AppState) -> AppResult<UserProfile> {
    let user_id = current_user(jar, app_state)?;
    let user = app_state.auth_use_cases.get_user(user_id).await?;
    if !user.role.is_admin() {
        tracing::warn!(%user_id, "Non-admin tried an admin route");
        return Err(AppError::Forbidden);
    }
    Ok(user)
}
