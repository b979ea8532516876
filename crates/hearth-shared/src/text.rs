//! Display helpers derived from stored fields.

use crate::constants::{DELETED_USER, NOWHERE};

/// Lowercase, URL-safe form of a label: runs of anything that is not ASCII
/// alphanumeric collapse into a single `-`.
pub fn to_safe_uri(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_dash = false;
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// `"{id}-{slug}"`, or just the id when the label has no usable characters.
pub fn to_param(id: i64, label: &str) -> String {
    let slug = to_safe_uri(label);
    if slug.is_empty() {
        id.to_string()
    } else {
        format!("{id}-{slug}")
    }
}

/// Blank input becomes empty; anything not already starting with `http`
/// gets an `http://` prefix.
pub fn fix_http(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        String::new()
    } else if value.starts_with("http") {
        value.to_string()
    } else {
        format!("http://{value}")
    }
}

/// Comparison key for case-insensitive uniqueness (emails, logins).
/// Folds the full Unicode range, not just ASCII.
pub fn case_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// First and last name joined; falls back to the login, then to the
/// deleted-user marker.
pub fn full_name(first: Option<&str>, last: Option<&str>, login: Option<&str>) -> String {
    let first = first.unwrap_or("").trim();
    let last = last.unwrap_or("").trim();
    if first.is_empty() && last.is_empty() {
        return login.unwrap_or(DELETED_USER).to_string();
    }
    format!("{first} {last}").trim().to_string()
}

pub fn display_location(location: Option<&str>) -> &str {
    match location {
        Some(l) if !l.trim().is_empty() => l,
        _ => NOWHERE,
    }
}
