//! Admin configuration loaded from environment variables.
//!
//! Every setting has a default so the tool runs against the platform data
//! directory with no configuration at all.

use std::path::PathBuf;
use std::time::Duration;

use hearth_shared::constants::{APP_NAME, DEFAULT_PER_PAGE, MAX_PER_PAGE};
use hearth_store::{CascadePolicy, DeleteRule};

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// SQLite database file.
    /// Env: `HEARTH_DB_PATH`
    /// Default: `hearth.db` in the platform data directory.
    pub db_path: Option<PathBuf>,

    /// Name used in outgoing mail.
    /// Env: `SITE_NAME`
    /// Default: `"Hearth"`
    pub site_name: String,

    /// Public URL prefix for photo and attachment links.
    /// Env: `SITE_URL`
    /// Default: `http://localhost:3000`
    pub site_url: String,

    /// Page size for listings.
    /// Env: `PER_PAGE`
    /// Default: `40`
    pub per_page: u32,

    /// Where contact-page mail goes.
    /// Env: `CONTACT_RECIPIENT`
    /// Default: `contact@localhost`
    pub contact_recipient: String,

    /// Upper bound on a photo search.
    /// Env: `PHOTO_SEARCH_TIMEOUT_SECS`
    /// Default: `5`
    pub photo_search_timeout: Duration,

    /// Delete rule applied to every profile dependent that supports it.
    /// Env: `PROFILE_DELETE_RULE` (restrict/cascade/detach)
    /// Default: unset, the store's built-in policy.
    pub profile_delete_rule: Option<DeleteRule>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            site_name: APP_NAME.to_string(),
            site_url: "http://localhost:3000".to_string(),
            per_page: DEFAULT_PER_PAGE,
            contact_recipient: "contact@localhost".to_string(),
            photo_search_timeout: Duration::from_secs(5),
            profile_delete_rule: None,
        }
    }
}

impl AdminConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("HEARTH_DB_PATH").filter(|p| !p.is_empty()) {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Some(name) = lookup("SITE_NAME").filter(|n| !n.trim().is_empty()) {
            config.site_name = name;
        }

        if let Some(url) = lookup("SITE_URL").filter(|u| !u.trim().is_empty()) {
            config.site_url = url.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("PER_PAGE") {
            match val.parse::<u32>() {
                Ok(n) if (1..=MAX_PER_PAGE).contains(&n) => config.per_page = n,
                _ => tracing::warn!(value = %val, "Invalid PER_PAGE, using default"),
            }
        }

        if let Some(to) = lookup("CONTACT_RECIPIENT") {
            if to.contains('@') {
                config.contact_recipient = to;
            } else {
                tracing::warn!(value = %to, "Invalid CONTACT_RECIPIENT, using default");
            }
        }

        if let Some(val) = lookup("PHOTO_SEARCH_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.photo_search_timeout = Duration::from_secs(secs),
                _ => tracing::warn!(
                    value = %val,
                    "Invalid PHOTO_SEARCH_TIMEOUT_SECS, using default"
                ),
            }
        }

        if let Some(val) = lookup("PROFILE_DELETE_RULE") {
            match val.parse::<DeleteRule>() {
                Ok(rule) => config.profile_delete_rule = Some(rule),
                Err(e) => tracing::warn!(
                    value = %val,
                    error = %e,
                    "Invalid PROFILE_DELETE_RULE, using default"
                ),
            }
        }

        config
    }

    pub fn cascade_policy(&self) -> CascadePolicy {
        let policy = CascadePolicy::default();
        match self.profile_delete_rule {
            Some(rule) => policy.for_profile_dependents(rule),
            None => policy,
        }
    }
}
