//! Ordered lifecycle hooks around entity writes.
//!
//! Each entity type has its own [`Hooks`] list.  A write runs a fixed
//! pipeline:
//!
//! 1. `before_validation` on every hook, in registration order
//! 2. the draft's own [`Validate`] rules, then store-level checks
//!    (uniqueness, referenced rows)
//! 3. `after_validation` on every hook, which may add errors
//! 4. the write itself
//! 5. `after_commit` on every hook, with the saved record

use hearth_shared::text::fix_http;
use hearth_shared::validation::{Validate, MSG_MISSING};
use hearth_shared::{EntityKind, RequestContext, RuleKind, ValidationErrors};

use crate::error::Result;
use crate::models::{Blog, Comment, Forum, ForumPost, ForumTopic, Message, Profile, User};
use crate::profiles::NewProfile;

/// A persisted record type and the draft it is written from.
pub trait Entity {
    type Draft: Validate;
    const KIND: EntityKind;
}

pub trait LifecycleHook<E: Entity>: Send + Sync {
    /// Used in logs.
    fn name(&self) -> &'static str;

    fn before_validation(&self, _ctx: &RequestContext, _draft: &mut E::Draft) {}

    fn after_validation(
        &self,
        _ctx: &RequestContext,
        _draft: &E::Draft,
        _errors: &mut ValidationErrors,
    ) {
    }

    fn after_commit(&self, _ctx: &RequestContext, _record: &E) {}
}

pub struct Hooks<E: Entity> {
    hooks: Vec<Box<dyn LifecycleHook<E>>>,
}

impl<E: Entity> Default for Hooks<E> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<E: Entity> Hooks<E> {
    /// Append a hook; it runs after every hook registered before it.
    pub fn register(&mut self, hook: impl LifecycleHook<E> + 'static) {
        tracing::debug!(entity = %E::KIND, hook = hook.name(), "registered lifecycle hook");
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Steps 1-3 of the pipeline.  `store_checks` adds the rules that need
    /// a query; it may also fail outright (e.g. a referenced row is missing).
    pub(crate) fn validate<F>(
        &self,
        ctx: &RequestContext,
        draft: &mut E::Draft,
        store_checks: F,
    ) -> Result<()>
    where
        F: FnOnce(&E::Draft, &mut ValidationErrors) -> Result<()>,
    {
        for hook in &self.hooks {
            hook.before_validation(ctx, draft);
        }

        let mut errors = draft.validate();
        store_checks(draft, &mut errors)?;

        for hook in &self.hooks {
            hook.after_validation(ctx, draft, &mut errors);
        }

        if !errors.is_empty() {
            tracing::debug!(entity = %E::KIND, failures = errors.len(), "validation failed");
        }
        errors.into_result()?;
        Ok(())
    }

    /// Step 5.
    pub(crate) fn committed(&self, ctx: &RequestContext, record: &E) {
        for hook in &self.hooks {
            hook.after_commit(ctx, record);
        }
    }
}

/// Store-check helper for a row the draft points at.  A missing row is
/// recorded on `field` so it is reported with every other failure; any other
/// error still aborts.  Returns the row when it exists.
pub(crate) fn check_reference<T>(
    errors: &mut ValidationErrors,
    field: &str,
    lookup: Result<T>,
) -> Result<Option<T>> {
    match lookup {
        Ok(row) => Ok(Some(row)),
        Err(e) if e.is_not_found() => {
            errors.add(field, RuleKind::Invalid, MSG_MISSING);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Hook lists for every entity the store writes.
pub struct HookRegistry {
    pub users: Hooks<User>,
    pub profiles: Hooks<Profile>,
    pub forums: Hooks<Forum>,
    pub topics: Hooks<ForumTopic>,
    pub posts: Hooks<ForumPost>,
    pub blogs: Hooks<Blog>,
    pub comments: Hooks<Comment>,
    pub messages: Hooks<Message>,
}

impl HookRegistry {
    /// No hooks at all, not even the built-in normalizers.
    pub fn empty() -> Self {
        Self {
            users: Hooks::default(),
            profiles: Hooks::default(),
            forums: Hooks::default(),
            topics: Hooks::default(),
            posts: Hooks::default(),
            blogs: Hooks::default(),
            comments: Hooks::default(),
            messages: Hooks::default(),
        }
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.profiles.register(NormalizeProfileUrls);
        registry
    }
}

// ---------------------------------------------------------------------------
// Built-in hooks
// ---------------------------------------------------------------------------

/// Prefix bare website/blog/flickr values with `http://`.
pub struct NormalizeProfileUrls;

impl LifecycleHook<Profile> for NormalizeProfileUrls {
    fn name(&self) -> &'static str {
        "normalize_profile_urls"
    }

    fn before_validation(&self, _ctx: &RequestContext, draft: &mut NewProfile) {
        draft.website = fix_http(&draft.website);
        draft.blog = fix_http(&draft.blog);
        draft.flickr = fix_http(&draft.flickr);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::StoreError;

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl LifecycleHook<Profile> for Recorder {
        fn name(&self) -> &'static str {
            self.label
        }

        fn before_validation(&self, _ctx: &RequestContext, _draft: &mut NewProfile) {
            self.log.lock().unwrap().push(format!("{}:before", self.label));
        }

        fn after_validation(
            &self,
            _ctx: &RequestContext,
            _draft: &NewProfile,
            _errors: &mut ValidationErrors,
        ) {
            self.log.lock().unwrap().push(format!("{}:after", self.label));
        }
    }

    struct RejectExampleDomain;

    impl LifecycleHook<Profile> for RejectExampleDomain {
        fn name(&self) -> &'static str {
            "reject_example_domain"
        }

        fn after_validation(
            &self,
            _ctx: &RequestContext,
            draft: &NewProfile,
            errors: &mut ValidationErrors,
        ) {
            if draft.email.ends_with("@example.invalid") {
                errors.add("email", RuleKind::Invalid, "uses a blocked domain");
            }
        }
    }

    fn draft(email: &str) -> NewProfile {
        NewProfile {
            email: email.to_string(),
            ..NewProfile::default()
        }
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut hooks: Hooks<Profile> = Hooks::default();
        hooks.register(Recorder { label: "a", log: log.clone() });
        hooks.register(Recorder { label: "b", log: log.clone() });

        let ctx = RequestContext::anonymous();
        hooks
            .validate(&ctx, &mut draft("ok@x.com"), |_, _| Ok(()))
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "a:after", "b:after"]
        );
    }

    #[test]
    fn after_validation_errors_join_rule_errors() {
        let mut hooks: Hooks<Profile> = Hooks::default();
        hooks.register(RejectExampleDomain);

        let ctx = RequestContext::anonymous();
        let err = hooks
            .validate(&ctx, &mut draft("x@example.invalid"), |_, errors| {
                errors.add("email", RuleKind::Uniqueness, "has already been taken");
                Ok(())
            })
            .unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has("email", RuleKind::Invalid));
        assert!(errors.has("email", RuleKind::Uniqueness));
    }

    #[test]
    fn missing_reference_joins_rule_errors() {
        let hooks: Hooks<Profile> = Hooks::default();
        let err = hooks
            .validate(&RequestContext::anonymous(), &mut draft("BAD"), |_, errors| {
                let lookup: Result<()> = Err(StoreError::not_found(EntityKind::User, 9));
                assert!(check_reference(errors, "user_id", lookup)?.is_none());
                Ok(())
            })
            .unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has("email", RuleKind::Format));
        assert!(errors.has("user_id", RuleKind::Invalid));
    }

    #[test]
    fn other_lookup_errors_still_abort() {
        let mut errors = ValidationErrors::new();
        let lookup: Result<()> = Err(StoreError::Migration("boom".into()));
        assert!(check_reference(&mut errors, "user_id", lookup).is_err());
        assert!(errors.is_empty());
    }

    #[test]
    fn default_registry_normalizes_urls() {
        let registry = HookRegistry::default();
        let mut d = NewProfile {
            website: "example.com".into(),
            ..draft("ok@x.com")
        };
        registry
            .profiles
            .validate(&RequestContext::anonymous(), &mut d, |_, _| Ok(()))
            .unwrap();
        assert_eq!(d.website, "http://example.com");
        assert_eq!(d.blog, "");
    }
}
