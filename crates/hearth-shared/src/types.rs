use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Row identifiers are SQLite INTEGER PRIMARY KEYs wrapped per entity so
// a ProfileId can never be passed where a ForumId is expected.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(UserId);
entity_id!(ProfileId);
entity_id!(FriendId);
entity_id!(ForumId);
entity_id!(TopicId);
entity_id!(PostId);
entity_id!(BlogId);
entity_id!(CommentId);
entity_id!(MessageId);
entity_id!(FeedItemId);
entity_id!(PhotoId);

/// Every durable record type in the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    User,
    Profile,
    Friend,
    Forum,
    ForumTopic,
    ForumPost,
    Blog,
    Comment,
    Message,
    FeedItem,
    Photo,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Profile => "Profile",
            Self::Friend => "Friend",
            Self::Forum => "Forum",
            Self::ForumTopic => "ForumTopic",
            Self::ForumPost => "ForumPost",
            Self::Blog => "Blog",
            Self::Comment => "Comment",
            Self::Message => "Message",
            Self::FeedItem => "FeedItem",
            Self::Photo => "Photo",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "User" => Self::User,
            "Profile" => Self::Profile,
            "Friend" => Self::Friend,
            "Forum" => Self::Forum,
            "ForumTopic" => Self::ForumTopic,
            "ForumPost" => Self::ForumPost,
            "Blog" => Self::Blog,
            "Comment" => Self::Comment,
            "Message" => Self::Message,
            "FeedItem" => Self::FeedItem,
            "Photo" => Self::Photo,
            other => return Err(format!("unknown entity kind: {other}")),
        };
        Ok(kind)
    }
}

// ---------------------------------------------------------------------------
// Friend edges
// ---------------------------------------------------------------------------

/// Status of a directed friend edge.  A pending edge doubles as a "follow".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FriendStatus {
    Pending = 0,
    Accepted = 1,
}

impl FriendStatus {
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::Pending),
            1 => Some(Self::Accepted),
            _ => None,
        }
    }

    /// Edges only ever move forward.
    pub fn can_become(self, next: FriendStatus) -> bool {
        matches!((self, next), (Self::Pending, Self::Accepted))
    }
}

impl fmt::Display for FriendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Accepted => f.write_str("accepted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Commentable targets
// ---------------------------------------------------------------------------

/// The kinds of record a comment may be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommentableKind {
    Profile,
    Blog,
}

impl CommentableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profile => "Profile",
            Self::Blog => "Blog",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Profile" => Some(Self::Profile),
            "Blog" => Some(Self::Blog),
            _ => None,
        }
    }
}

/// Where a comment is posted: a profile's wall or a blog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum CommentTarget {
    Profile(ProfileId),
    Blog(BlogId),
}

impl CommentTarget {
    pub fn from_parts(kind: CommentableKind, id: i64) -> Self {
        match kind {
            CommentableKind::Profile => Self::Profile(ProfileId(id)),
            CommentableKind::Blog => Self::Blog(BlogId(id)),
        }
    }
}

/// Capability of anything that can carry comments.
pub trait Commentable {
    fn addressable_id(&self) -> i64;
    fn kind(&self) -> CommentableKind;

    fn comment_target(&self) -> CommentTarget {
        CommentTarget::from_parts(self.kind(), self.addressable_id())
    }
}

impl Commentable for CommentTarget {
    fn addressable_id(&self) -> i64 {
        match self {
            Self::Profile(id) => id.0,
            Self::Blog(id) => id.0,
        }
    }

    fn kind(&self) -> CommentableKind {
        match self {
            Self::Profile(_) => CommentableKind::Profile,
            Self::Blog(_) => CommentableKind::Blog,
        }
    }

    fn comment_target(&self) -> CommentTarget {
        *self
    }
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// Which feed items to return for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FeedScope {
    #[default]
    All,
    Public,
    Private,
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

/// Metadata persisted alongside a record that owns an uploaded image.  The
/// bytes themselves live with the attachment service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_status_only_moves_forward() {
        assert!(FriendStatus::Pending.can_become(FriendStatus::Accepted));
        assert!(!FriendStatus::Accepted.can_become(FriendStatus::Pending));
        assert!(!FriendStatus::Accepted.can_become(FriendStatus::Accepted));
        assert_eq!(FriendStatus::from_i64(2), None);
    }

    #[test]
    fn comment_target_exposes_kind_and_id() {
        let target = CommentTarget::Blog(BlogId(9));
        assert_eq!(target.kind(), CommentableKind::Blog);
        assert_eq!(target.addressable_id(), 9);
        assert_eq!(
            CommentTarget::from_parts(CommentableKind::Profile, 3),
            CommentTarget::Profile(ProfileId(3))
        );
    }

    #[test]
    fn entity_kind_parses_its_own_name() {
        for kind in [EntityKind::ForumTopic, EntityKind::Photo, EntityKind::User] {
            assert_eq!(kind.as_str().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("Widget".parse::<EntityKind>().is_err());
    }
}
