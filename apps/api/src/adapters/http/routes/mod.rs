pub mod admin;
pub mod analytics;
pub mod auth;
pub mod billing;
mod common;
pub mod forms;
pub mod links;
pub mod profile;
pub mod public;
pub mod social_links;
pub mod theme;
pub mod user;
pub mod webhooks;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/user", user::router())
        .nest("/profile", profile::router())
        .nest("/links", links::router())
        .nest("/social-links", social_links::router())
        .nest("/forms", forms::router())
        .nest("/theme", theme::router())
        .nest("/analytics", analytics::router())
        .nest("/billing", billing::router())
        .nest("/webhooks", webhooks::router())
        .nest("/admin", admin::router())
        .nest("/public", public::router())
}
