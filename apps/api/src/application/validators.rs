use url::Url;
use validator::ValidateEmail;

use crate::domain::entities::user::is_reserved_username;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

/// Validates a profile username.
/// Rules:
/// - 3-30 characters
/// - Only lowercase ASCII letters, digits, underscores and dots
/// - Must start with a letter or digit
/// - Not a reserved route name
pub fn is_valid_username(username: &str) -> bool {
    if username.len() < 3 || username.len() > 30 {
        return false;
    }

    let Some(first) = username.chars().next() else {
        return false;
    };
    if !first.is_ascii_lowercase() && !first.is_ascii_digit() {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.')
        && !is_reserved_username(username)
}

/// Normalizes a user-supplied link target to an absolute http(s) URL.
/// Scheme-less input gets `https://`.
pub fn normalize_url(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.len() > 2048 || trimmed.chars().any(char::is_whitespace) {
        return None;
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(url.to_string())
}

/// Strict variant for stored URLs such as avatars: the scheme must be given.
pub fn is_http_url(input: &str) -> bool {
    Url::parse(input.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Trims and truncates to at most `max` characters.
pub fn truncate_chars(input: &str, max: usize) -> String {
    input.trim().chars().take(max).collect()
}
