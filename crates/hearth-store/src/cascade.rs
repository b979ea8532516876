//! Explicit delete policy for every parent/child relationship.
//!
//! Nothing is deleted or orphaned implicitly.  Each [`Relation`] has one
//! [`DeleteRule`]; `Restrict` refuses the delete while dependents exist,
//! `Cascade` removes them, `Detach` nulls their link (nullable links only).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use hearth_shared::EntityKind;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteRule {
    Cascade,
    Restrict,
    Detach,
}

impl FromStr for DeleteRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cascade" => Ok(Self::Cascade),
            "restrict" => Ok(Self::Restrict),
            "detach" | "nullify" => Ok(Self::Detach),
            other => Err(format!("unknown delete rule: {other}")),
        }
    }
}

impl fmt::Display for DeleteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cascade => f.write_str("cascade"),
            Self::Restrict => f.write_str("restrict"),
            Self::Detach => f.write_str("detach"),
        }
    }
}

/// A parent -> dependents link that a delete has to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    UserProfile,
    ProfileAuthoredComments,
    ProfileWallComments,
    ProfileSentMessages,
    ProfileReceivedMessages,
    ProfileFriendships,
    ProfileBlogs,
    ProfilePhotos,
    ProfileFeeds,
    ProfileForumPosts,
    ProfileForumTopics,
    BlogComments,
    ForumTopics,
    TopicPosts,
}

/// SQL for one relation; `?1` is the parent id.
pub(crate) struct DependentSql {
    pub count: &'static str,
    pub delete: &'static str,
    pub detach: Option<&'static str>,
}

impl Relation {
    pub const ALL: [Relation; 14] = [
        Self::UserProfile,
        Self::ProfileAuthoredComments,
        Self::ProfileWallComments,
        Self::ProfileSentMessages,
        Self::ProfileReceivedMessages,
        Self::ProfileFriendships,
        Self::ProfileBlogs,
        Self::ProfilePhotos,
        Self::ProfileFeeds,
        Self::ProfileForumPosts,
        Self::ProfileForumTopics,
        Self::BlogComments,
        Self::ForumTopics,
        Self::TopicPosts,
    ];

    /// Profile relations in the order `delete_profile` resolves them.
    /// Authored comments go before wall comments so a comment on one's own
    /// wall is settled by the authored rule.
    pub const PROFILE_DEPENDENTS: [Relation; 10] = [
        Self::ProfileAuthoredComments,
        Self::ProfileWallComments,
        Self::ProfileSentMessages,
        Self::ProfileReceivedMessages,
        Self::ProfileFriendships,
        Self::ProfileBlogs,
        Self::ProfilePhotos,
        Self::ProfileFeeds,
        Self::ProfileForumPosts,
        Self::ProfileForumTopics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserProfile => "user_profile",
            Self::ProfileAuthoredComments => "profile_authored_comments",
            Self::ProfileWallComments => "profile_wall_comments",
            Self::ProfileSentMessages => "profile_sent_messages",
            Self::ProfileReceivedMessages => "profile_received_messages",
            Self::ProfileFriendships => "profile_friendships",
            Self::ProfileBlogs => "profile_blogs",
            Self::ProfilePhotos => "profile_photos",
            Self::ProfileFeeds => "profile_feeds",
            Self::ProfileForumPosts => "profile_forum_posts",
            Self::ProfileForumTopics => "profile_forum_topics",
            Self::BlogComments => "blog_comments",
            Self::ForumTopics => "forum_topics",
            Self::TopicPosts => "topic_posts",
        }
    }

    pub fn parent(self) -> EntityKind {
        match self {
            Self::UserProfile => EntityKind::User,
            Self::BlogComments => EntityKind::Blog,
            Self::ForumTopics => EntityKind::Forum,
            Self::TopicPosts => EntityKind::ForumTopic,
            _ => EntityKind::Profile,
        }
    }

    pub fn child(self) -> EntityKind {
        match self {
            Self::UserProfile => EntityKind::Profile,
            Self::ProfileAuthoredComments | Self::ProfileWallComments | Self::BlogComments => {
                EntityKind::Comment
            }
            Self::ProfileSentMessages | Self::ProfileReceivedMessages => EntityKind::Message,
            Self::ProfileFriendships => EntityKind::Friend,
            Self::ProfileBlogs => EntityKind::Blog,
            Self::ProfilePhotos => EntityKind::Photo,
            Self::ProfileFeeds => EntityKind::FeedItem,
            Self::ProfileForumPosts | Self::TopicPosts => EntityKind::ForumPost,
            Self::ForumTopics | Self::ProfileForumTopics => EntityKind::ForumTopic,
        }
    }

    /// Whether the dependent's link column is nullable, i.e. `Detach` is
    /// possible.
    pub fn supports_detach(self) -> bool {
        self.sql().detach.is_some()
    }

    /// Forum content always goes with its forum.
    pub fn is_fixed(self) -> bool {
        matches!(self, Self::ForumTopics | Self::TopicPosts)
    }

    pub(crate) fn sql(self) -> DependentSql {
        match self {
            Self::UserProfile => DependentSql {
                count: "SELECT COUNT(*) FROM profiles WHERE user_id = ?1",
                delete: "DELETE FROM profiles WHERE user_id = ?1",
                detach: Some("UPDATE profiles SET user_id = NULL WHERE user_id = ?1"),
            },
            Self::ProfileAuthoredComments => DependentSql {
                count: "SELECT COUNT(*) FROM comments WHERE profile_id = ?1",
                delete: "DELETE FROM comments WHERE profile_id = ?1",
                detach: Some("UPDATE comments SET profile_id = NULL WHERE profile_id = ?1"),
            },
            Self::ProfileWallComments => DependentSql {
                count: "SELECT COUNT(*) FROM comments
                        WHERE commentable_type = 'Profile' AND commentable_id = ?1",
                delete: "DELETE FROM comments
                         WHERE commentable_type = 'Profile' AND commentable_id = ?1",
                detach: None,
            },
            Self::ProfileSentMessages => DependentSql {
                count: "SELECT COUNT(*) FROM messages WHERE sender_id = ?1",
                delete: "DELETE FROM messages WHERE sender_id = ?1",
                detach: Some("UPDATE messages SET sender_id = NULL WHERE sender_id = ?1"),
            },
            Self::ProfileReceivedMessages => DependentSql {
                count: "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1",
                delete: "DELETE FROM messages WHERE receiver_id = ?1",
                detach: Some("UPDATE messages SET receiver_id = NULL WHERE receiver_id = ?1"),
            },
            Self::ProfileFriendships => DependentSql {
                count: "SELECT COUNT(*) FROM friends WHERE inviter_id = ?1 OR invited_id = ?1",
                delete: "DELETE FROM friends WHERE inviter_id = ?1 OR invited_id = ?1",
                detach: None,
            },
            Self::ProfileBlogs => DependentSql {
                count: "SELECT COUNT(*) FROM blogs WHERE profile_id = ?1",
                delete: "DELETE FROM blogs WHERE profile_id = ?1",
                detach: None,
            },
            Self::ProfilePhotos => DependentSql {
                count: "SELECT COUNT(*) FROM photos WHERE profile_id = ?1",
                delete: "DELETE FROM photos WHERE profile_id = ?1",
                detach: None,
            },
            Self::ProfileFeeds => DependentSql {
                count: "SELECT COUNT(*) FROM feeds WHERE profile_id = ?1",
                delete: "DELETE FROM feeds WHERE profile_id = ?1",
                detach: None,
            },
            Self::ProfileForumPosts => DependentSql {
                count: "SELECT COUNT(*) FROM forum_posts WHERE owner_id = ?1",
                delete: "DELETE FROM forum_posts WHERE owner_id = ?1",
                detach: Some("UPDATE forum_posts SET owner_id = NULL WHERE owner_id = ?1"),
            },
            Self::ProfileForumTopics => DependentSql {
                count: "SELECT COUNT(*) FROM forum_topics WHERE owner_id = ?1",
                delete: "DELETE FROM forum_topics WHERE owner_id = ?1",
                detach: Some("UPDATE forum_topics SET owner_id = NULL WHERE owner_id = ?1"),
            },
            Self::BlogComments => DependentSql {
                count: "SELECT COUNT(*) FROM comments
                        WHERE commentable_type = 'Blog' AND commentable_id = ?1",
                delete: "DELETE FROM comments
                         WHERE commentable_type = 'Blog' AND commentable_id = ?1",
                detach: None,
            },
            Self::ForumTopics => DependentSql {
                count: "SELECT COUNT(*) FROM forum_topics WHERE forum_id = ?1",
                delete: "DELETE FROM forum_topics WHERE forum_id = ?1",
                detach: None,
            },
            Self::TopicPosts => DependentSql {
                count: "SELECT COUNT(*) FROM forum_posts WHERE topic_id = ?1",
                delete: "DELETE FROM forum_posts WHERE topic_id = ?1",
                detach: None,
            },
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One [`DeleteRule`] per [`Relation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePolicy {
    rules: HashMap<Relation, DeleteRule>,
}

impl Default for CascadePolicy {
    fn default() -> Self {
        let mut rules: HashMap<Relation, DeleteRule> = Relation::ALL
            .iter()
            .map(|r| (*r, DeleteRule::Restrict))
            .collect();
        rules.insert(Relation::UserProfile, DeleteRule::Detach);
        rules.insert(Relation::ProfileFriendships, DeleteRule::Cascade);
        rules.insert(Relation::ProfileFeeds, DeleteRule::Cascade);
        rules.insert(Relation::ProfileForumPosts, DeleteRule::Cascade);
        // A topic also holds other people's posts.
        rules.insert(Relation::ProfileForumTopics, DeleteRule::Detach);
        rules.insert(Relation::ForumTopics, DeleteRule::Cascade);
        rules.insert(Relation::TopicPosts, DeleteRule::Cascade);
        Self { rules }
    }
}

impl CascadePolicy {
    pub fn rule(&self, relation: Relation) -> DeleteRule {
        self.rules
            .get(&relation)
            .copied()
            .unwrap_or(DeleteRule::Restrict)
    }

    /// Change one rule.  Fails if the relation cannot honour it.
    pub fn set(&mut self, relation: Relation, rule: DeleteRule) -> Result<()> {
        check(relation, rule)?;
        self.rules.insert(relation, rule);
        Ok(())
    }

    /// Builder form of [`CascadePolicy::set`].
    pub fn with(mut self, relation: Relation, rule: DeleteRule) -> Result<Self> {
        self.set(relation, rule)?;
        Ok(self)
    }

    /// Apply `rule` to every profile relation.  Relations that cannot detach
    /// cascade instead when `Detach` is asked for.
    pub fn for_profile_dependents(mut self, rule: DeleteRule) -> Self {
        for relation in Relation::PROFILE_DEPENDENTS {
            let effective = match rule {
                DeleteRule::Detach if !relation.supports_detach() => DeleteRule::Cascade,
                other => other,
            };
            self.rules.insert(relation, effective);
        }
        self
    }

    /// Check every rule against the schema.
    pub fn validate(&self) -> Result<()> {
        for (relation, rule) in &self.rules {
            check(*relation, *rule)?;
        }
        Ok(())
    }
}

fn check(relation: Relation, rule: DeleteRule) -> Result<()> {
    if relation.is_fixed() && rule != DeleteRule::Cascade {
        return Err(StoreError::InvalidPolicy(format!(
            "{relation} always cascades"
        )));
    }
    if rule == DeleteRule::Detach && !relation.supports_detach() {
        return Err(StoreError::InvalidPolicy(format!(
            "{relation} has a required link and cannot be detached"
        )));
    }
    Ok(())
}

/// Settle `relation` for the parent row `parent_id` according to `policy`.
/// Returns the number of dependents removed or detached.
///
/// Must run inside the caller's transaction: a `Restrict` failure halfway
/// through a multi-relation delete relies on the rollback.
pub(crate) fn resolve(
    conn: &Connection,
    policy: &CascadePolicy,
    relation: Relation,
    parent_id: i64,
) -> Result<u64> {
    let sql = relation.sql();
    let dependents: i64 = conn.query_row(sql.count, params![parent_id], |row| row.get(0))?;
    if dependents == 0 {
        return Ok(0);
    }
    let dependents = dependents as u64;

    match policy.rule(relation) {
        DeleteRule::Restrict => {
            tracing::warn!(%relation, parent_id, dependents, "delete blocked by restrict rule");
            Err(StoreError::CascadeBlocked {
                relation,
                dependents,
            })
        }
        DeleteRule::Cascade => {
            conn.execute(sql.delete, params![parent_id])?;
            tracing::debug!(%relation, parent_id, dependents, "cascaded delete");
            Ok(dependents)
        }
        DeleteRule::Detach => {
            let detach = sql.detach.ok_or_else(|| {
                StoreError::InvalidPolicy(format!("{relation} cannot be detached"))
            })?;
            conn.execute(detach, params![parent_id])?;
            tracing::debug!(%relation, parent_id, dependents, "detached dependents");
            Ok(dependents)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        let policy = CascadePolicy::default();
        policy.validate().unwrap();
        assert_eq!(policy.rule(Relation::ForumTopics), DeleteRule::Cascade);
        assert_eq!(policy.rule(Relation::ProfileForumPosts), DeleteRule::Cascade);
        assert_eq!(policy.rule(Relation::ProfileAuthoredComments), DeleteRule::Restrict);
        assert_eq!(policy.rule(Relation::UserProfile), DeleteRule::Detach);
        assert_eq!(policy.rule(Relation::ProfileForumTopics), DeleteRule::Detach);
        assert_eq!(Relation::ProfileForumTopics.parent(), EntityKind::Profile);
        assert!(Relation::ALL
            .iter()
            .all(|r| CascadePolicy::default().rules.contains_key(r)));
    }

    #[test]
    fn required_links_cannot_detach() {
        let mut policy = CascadePolicy::default();
        assert!(policy
            .set(Relation::ProfileBlogs, DeleteRule::Detach)
            .is_err());
        assert!(policy
            .set(Relation::ProfileSentMessages, DeleteRule::Detach)
            .is_ok());
    }

    #[test]
    fn forum_cascade_is_fixed() {
        let mut policy = CascadePolicy::default();
        assert!(matches!(
            policy.set(Relation::ForumTopics, DeleteRule::Restrict),
            Err(StoreError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn blanket_detach_falls_back_to_cascade() {
        let policy = CascadePolicy::default().for_profile_dependents(DeleteRule::Detach);
        policy.validate().unwrap();
        assert_eq!(policy.rule(Relation::ProfileReceivedMessages), DeleteRule::Detach);
        assert_eq!(policy.rule(Relation::ProfileWallComments), DeleteRule::Cascade);
    }

    #[test]
    fn parses_rule_names() {
        assert_eq!("Cascade".parse::<DeleteRule>().unwrap(), DeleteRule::Cascade);
        assert_eq!("nullify".parse::<DeleteRule>().unwrap(), DeleteRule::Detach);
        assert!("drop".parse::<DeleteRule>().is_err());
    }
}
