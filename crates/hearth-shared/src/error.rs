use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which rule a field failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Presence,
    Format,
    Length,
    Uniqueness,
    /// The field can never change after creation (e.g. `id`).
    Immutable,
    /// The field may not be set from caller-supplied attributes.
    Protected,
    /// Anything else: unknown attribute, wrong type, self-reference.
    Invalid,
}

/// A single failed rule on a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub rule: RuleKind,
    pub message: String,
}

impl FieldError {
    /// `"Email does not look like an email address."`
    pub fn full_message(&self) -> String {
        format!("{} {}", humanize(&self.field), self.message)
    }
}

/// Every rule violation found on one candidate record.
///
/// Rules push into this collection instead of returning early, so a caller
/// sees all problems with a record at once.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[error("Validation failed: {}", joined(.errors))]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, rule: RuleKind, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.to_string(),
            rule,
            message: message.into(),
        });
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.iter()
    }

    /// Errors recorded against `field`.
    pub fn on<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }

    pub fn has(&self, field: &str, rule: RuleKind) -> bool {
        self.on(field).any(|e| e.rule == rule)
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.errors.iter().map(FieldError::full_message).collect()
    }

    /// `Ok(())` when nothing failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn joined(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::full_message)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `first_name` -> `First name`
fn humanize(field: &str) -> String {
    let spaced = field.trim_end_matches("_id").replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failure() {
        let mut errors = ValidationErrors::new();
        errors.add("email", RuleKind::Format, "does not look like an email address.");
        errors.add("email", RuleKind::Length, "is too short (minimum is 3 characters)");
        errors.add("first_name", RuleKind::Presence, "can't be blank");

        assert_eq!(errors.len(), 3);
        assert!(errors.has("email", RuleKind::Length));
        assert!(!errors.has("first_name", RuleKind::Length));
        assert_eq!(errors.on("email").count(), 2);
        assert_eq!(
            errors.full_messages()[2],
            "First name can't be blank".to_string()
        );
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn empty_collection_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
