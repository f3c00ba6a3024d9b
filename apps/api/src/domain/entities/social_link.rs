use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SocialPlatform {
    Instagram,
    X,
    Tiktok,
    Youtube,
    Facebook,
    Linkedin,
    Github,
    Twitch,
    Whatsapp,
    Email,
    Website,
}

impl SocialPlatform {
    /// Order of the icon row on the public page.
    pub fn display_order(&self) -> u8 {
        match self {
            SocialPlatform::Instagram => 0,
            SocialPlatform::X => 1,
            SocialPlatform::Tiktok => 2,
            SocialPlatform::Youtube => 3,
            SocialPlatform::Facebook => 4,
            SocialPlatform::Linkedin => 5,
            SocialPlatform::Github => 6,
            SocialPlatform::Twitch => 7,
            SocialPlatform::Whatsapp => 8,
            SocialPlatform::Email => 9,
            SocialPlatform::Website => 10,
        }
    }

    /// The email icon takes an address instead of a URL.
    pub fn takes_email(&self) -> bool {
        matches!(self, SocialPlatform::Email)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialLink {
    pub id: Uuid,
    pub user_id: Uuid,
    pub platform: SocialPlatform,
    pub url: String,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

pub fn sort_for_display(links: &mut [SocialLink]) {
    links.sort_by_key(|l| l.platform.display_order());
}
