use serde::{Deserialize, Serialize};

/// Everything a renderer needs to draw a public profile page.
///
/// Links are already filtered to active ones and ordered by position;
/// social links are in platform display order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub theme: PublicTheme,
    pub links: Vec<PublicLink>,
    pub social_links: Vec<PublicSocialLink>,
    pub forms: Vec<PublicForm>,
    /// Free profiles carry the product footer.
    pub show_branding: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicLink {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSocialLink {
    /// Platform slug (e.g. "instagram", "github")
    pub platform: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicForm {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<PublicFormField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicFormField {
    pub name: String,
    pub label: String,
    /// One of "text", "email", "phone", "textarea", "number"
    pub kind: String,
    pub required: bool,
    pub max_length: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicTheme {
    pub preset: String,
    pub background_color: String,
    pub text_color: String,
    pub button_color: String,
    pub button_text_color: String,
    pub button_style: String,
    pub font: String,
}
