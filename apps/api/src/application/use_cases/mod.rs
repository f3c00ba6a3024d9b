pub mod admin;
pub mod analytics;
pub mod billing;
pub mod forms;
pub mod links;
pub mod profile;
pub mod social_links;
pub mod theme;
pub mod user;
