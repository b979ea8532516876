//! Screening of caller-supplied attribute maps.
//!
//! Update operations accept a JSON object of attribute changes.  Before any
//! of it reaches an entity, [`AttributeFilter::screen`] rejects immutable and
//! protected attributes, unknown names and non-string values, reporting all
//! of them together.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{RuleKind, ValidationErrors};
use crate::validation::{MSG_IMMUTABLE, MSG_PROTECTED};

/// A screened attribute: `None` means "clear this field".
pub type Attributes = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone, Copy)]
pub struct AttributeFilter {
    /// Never writable after creation.
    pub immutable: &'static [&'static str],
    /// Writable only by internal operations.
    pub protected: &'static [&'static str],
    /// Writable from caller-supplied attributes.
    pub permitted: &'static [&'static str],
}

impl AttributeFilter {
    pub fn screen(&self, params: &Value) -> Result<Attributes, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut accepted = Attributes::new();

        let Some(map) = params.as_object() else {
            errors.add("base", RuleKind::Invalid, "must be an object of attributes");
            return Err(errors);
        };

        for (name, value) in map {
            let name = name.as_str();
            if self.immutable.contains(&name) {
                errors.add(name, RuleKind::Immutable, MSG_IMMUTABLE);
            } else if self.protected.contains(&name) {
                errors.add(name, RuleKind::Protected, MSG_PROTECTED);
            } else if !self.permitted.contains(&name) {
                errors.add(name, RuleKind::Invalid, "is not a known attribute");
            } else {
                match value {
                    Value::Null => {
                        accepted.insert(name.to_string(), None);
                    }
                    Value::String(s) => {
                        accepted.insert(name.to_string(), Some(s.clone()));
                    }
                    _ => errors.add(name, RuleKind::Invalid, "must be a string"),
                }
            }
        }

        errors.into_result().map(|_| accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FILTER: AttributeFilter = AttributeFilter {
        immutable: &["id"],
        protected: &["is_active"],
        permitted: &["name", "about_me"],
    };

    #[test]
    fn rejects_immutable_and_protected_together() {
        let errors = FILTER
            .screen(&json!({ "id": 5, "is_active": true, "name": "x" }))
            .unwrap_err();
        assert!(errors.has("id", RuleKind::Immutable));
        assert!(errors.has("is_active", RuleKind::Protected));
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn null_clears_and_strings_pass() {
        let attrs = FILTER
            .screen(&json!({ "name": "Bob", "about_me": null }))
            .unwrap();
        assert_eq!(attrs["name"].as_deref(), Some("Bob"));
        assert_eq!(attrs["about_me"], None);
    }

    #[test]
    fn unknown_and_mistyped_attributes_fail() {
        let errors = FILTER
            .screen(&json!({ "colour": "red", "name": 3 }))
            .unwrap_err();
        assert!(errors.has("colour", RuleKind::Invalid));
        assert!(errors.has("name", RuleKind::Invalid));
        assert!(FILTER.screen(&json!([1, 2])).is_err());
    }
}
