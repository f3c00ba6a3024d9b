use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// Usernames that would shadow application routes on the public site.
pub const RESERVED_USERNAMES: &[&str] = &[
    "admin",
    "api",
    "app",
    "login",
    "logout",
    "settings",
    "billing",
    "dashboard",
    "www",
    "help",
    "support",
];

pub fn is_reserved_username(username: &str) -> bool {
    RESERVED_USERNAMES.contains(&username)
}
