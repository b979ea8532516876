//! Explicit per-request context.
//!
//! Operations that depend on "who is asking" or "what time is it" take a
//! [`RequestContext`] argument instead of reading ambient state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_TIME_ZONE;
use crate::types::ProfileId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Profile of the signed-in user, if any.
    pub current_profile: Option<ProfileId>,
    /// Time zone name chosen by that profile.
    pub time_zone: Option<String>,
    /// Wall-clock time the request is processed at.  Every timestamp the
    /// store writes for this request comes from here.
    pub now: DateTime<Utc>,
}

impl RequestContext {
    /// A request with no signed-in profile.
    pub fn anonymous() -> Self {
        Self {
            current_profile: None,
            time_zone: None,
            now: Utc::now(),
        }
    }

    /// A request acting on behalf of `profile`.
    pub fn for_profile(profile: ProfileId, time_zone: Option<String>) -> Self {
        Self {
            current_profile: Some(profile),
            time_zone: time_zone.filter(|tz| !tz.trim().is_empty()),
            now: Utc::now(),
        }
    }

    /// Pin the request clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// The resolved time zone name, falling back to UTC.
    pub fn time_zone(&self) -> &str {
        self.time_zone.as_deref().unwrap_or(DEFAULT_TIME_ZONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn blank_time_zone_resolves_to_utc() {
        let ctx = RequestContext::for_profile(ProfileId(1), Some("  ".into()));
        assert_eq!(ctx.time_zone(), "UTC");

        let ctx = RequestContext::for_profile(ProfileId(1), Some("Europe/Paris".into()));
        assert_eq!(ctx.time_zone(), "Europe/Paris");
    }

    #[test]
    fn clock_can_be_pinned() {
        let t = Utc.with_ymd_and_hms(2008, 3, 1, 12, 0, 0).unwrap();
        let ctx = RequestContext::anonymous().at(t);
        assert_eq!(ctx.now, t);
        assert!(ctx.current_profile.is_none());
    }
}
