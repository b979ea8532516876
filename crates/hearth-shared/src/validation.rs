//! Field-level validation rules.
//!
//! Every rule is a pure function that appends to a [`ValidationErrors`]
//! collection and never returns early.  Rules that need the store
//! (uniqueness) live in `hearth-store` and push into the same collection.

use std::ops::RangeInclusive;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{EMAIL_MAX_LEN, EMAIL_MIN_LEN, LOGIN_MAX_LEN, LOGIN_MIN_LEN};
use crate::error::{RuleKind, ValidationErrors};

pub const MSG_BLANK: &str = "can't be blank";
pub const MSG_TAKEN: &str = "has already been taken";
pub const MSG_BAD_EMAIL: &str = "does not look like an email address.";
pub const MSG_IMMUTABLE: &str = "can't be changed";
pub const MSG_PROTECTED: &str = "can't be assigned";
pub const MSG_MISSING: &str = "does not exist";

static EMAIL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[^@\s]+@(?:[-a-z0-9]+\.)+[a-z]{2,}$").expect("email pattern compiles")
});

/// Implemented by every candidate record the store accepts.
pub trait Validate {
    /// Run the record's own rules.  Never short-circuits.
    fn validate(&self) -> ValidationErrors;
}

pub fn presence(errors: &mut ValidationErrors, field: &str, value: Option<&str>) {
    if value.map_or(true, |v| v.trim().is_empty()) {
        errors.add(field, RuleKind::Presence, MSG_BLANK);
    }
}

/// Character-length check, reported with the too-short / too-long wording.
pub fn length(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    range: RangeInclusive<usize>,
) {
    let len = value.chars().count();
    if len < *range.start() {
        errors.add(
            field,
            RuleKind::Length,
            format!("is too short (minimum is {} characters)", range.start()),
        );
    } else if len > *range.end() {
        errors.add(
            field,
            RuleKind::Length,
            format!("is too long (maximum is {} characters)", range.end()),
        );
    }
}

/// Range check reported as a single "wrong length" message.
pub fn length_between(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    range: RangeInclusive<usize>,
) {
    if !range.contains(&value.chars().count()) {
        errors.add(
            field,
            RuleKind::Length,
            format!(
                "is the wrong length (should be {} to {} characters)",
                range.start(),
                range.end()
            ),
        );
    }
}

pub fn format(errors: &mut ValidationErrors, field: &str, value: &str, re: &Regex, message: &str) {
    if !re.is_match(value) {
        errors.add(field, RuleKind::Format, message);
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_FORMAT.is_match(value)
}

/// Format and length rules for a profile email address.
pub fn email(errors: &mut ValidationErrors, field: &str, value: &str) {
    format(errors, field, value, &EMAIL_FORMAT, MSG_BAD_EMAIL);
    length_between(errors, field, value, EMAIL_MIN_LEN..=EMAIL_MAX_LEN);
}

/// Presence and length rules for a user login.
pub fn login(errors: &mut ValidationErrors, field: &str, value: &str) {
    presence(errors, field, Some(value));
    if !value.trim().is_empty() {
        length(errors, field, value, LOGIN_MIN_LEN..=LOGIN_MAX_LEN);
    }
}
