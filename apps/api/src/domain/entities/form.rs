use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;
use validator::ValidateEmail;

pub const MAX_FIELDS: usize = 20;
pub const DEFAULT_MAX_LENGTH: u32 = 500;
pub const MAX_FIELD_LENGTH: u32 = 5000;

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
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Textarea,
    Number,
}

fn default_max_length() -> u32 {
    DEFAULT_MAX_LENGTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Form {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub is_active: bool,
    pub notify_owner: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub values: BTreeMap<String, String>,
    pub created_at: Option<NaiveDateTime>,
}

fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 40
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_phone(value: &str) -> bool {
    (6..=20).contains(&value.chars().count())
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
        && value.chars().any(|c| c.is_ascii_digit())
}

/// Validates a form definition. Returns a user-facing message on failure.
pub fn validate_fields(fields: &[FormField]) -> Result<(), String> {
    if fields.is_empty() {
        return Err("A form needs at least one field".into());
    }
    if fields.len() > MAX_FIELDS {
        return Err(format!("A form can have at most {MAX_FIELDS} fields"));
    }

    let mut names = HashSet::with_capacity(fields.len());
    for field in fields {
        if !is_valid_field_name(&field.name) {
            return Err(format!(
                "Invalid field name '{}': use 1-40 lowercase letters, digits or underscores",
                field.name
            ));
        }
        if !names.insert(field.name.as_str()) {
            return Err(format!("Duplicate field name '{}'", field.name));
        }
        let label = field.label.trim();
        if label.is_empty() || label.chars().count() > 100 {
            return Err(format!("Field '{}' needs a label of 1-100 characters", field.name));
        }
        if field.max_length == 0 || field.max_length > MAX_FIELD_LENGTH {
            return Err(format!(
                "Field '{}' max_length must be between 1 and {MAX_FIELD_LENGTH}",
                field.name
            ));
        }
    }

    Ok(())
}

/// Checks a visitor's submission against the form's fields and returns the
/// cleaned values. Blank optional values are dropped.
pub fn validate_submission(
    fields: &[FormField],
    values: &BTreeMap<String, serde_json::Value>,
) -> Result<BTreeMap<String, String>, String> {
    if let Some(unknown) = values
        .keys()
        .find(|k| !fields.iter().any(|f| &f.name == *k))
    {
        return Err(format!("Unknown field '{unknown}'"));
    }

    let mut cleaned = BTreeMap::new();
    for field in fields {
        let raw = match values.get(&field.name) {
            None | Some(serde_json::Value::Null) => String::new(),
            Some(serde_json::Value::String(s)) => s.trim().to_string(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(_) => return Err(format!("Field '{}' must be text", field.name)),
        };

        if raw.is_empty() {
            if field.required {
                return Err(format!("Field '{}' is required", field.label));
            }
            continue;
        }

        if raw.chars().count() > field.max_length as usize {
            return Err(format!(
                "Field '{}' is longer than {} characters",
                field.label, field.max_length
            ));
        }

        let ok = match field.kind {
            FieldKind::Text | FieldKind::Textarea => true,
            FieldKind::Email => raw.as_str().validate_email(),
            FieldKind::Phone => is_valid_phone(&raw),
            FieldKind::Number => raw.parse::<f64>().is_ok_and(f64::is_finite),
        };
        if !ok {
            return Err(format!("Field '{}' is not a valid {}", field.label, field.kind));
        }

        cleaned.insert(field.name.clone(), raw);
    }

    Ok(cleaned)
}
