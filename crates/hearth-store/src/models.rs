//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to a presentation layer.

use chrono::{DateTime, Utc};
use hearth_shared::text;
use hearth_shared::{
    AttachmentMeta, BlogId, CommentId, CommentTarget, Commentable, CommentableKind, EntityKind,
    FeedItemId, ForumId, FriendId, FriendStatus, MessageId, PhotoId, PostId, ProfileId, TopicId,
    UserId,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account.  Credentials are opaque to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    #[serde(skip_serializing, default)]
    pub crypted_password: Option<String>,
    #[serde(skip_serializing, default)]
    pub salt: Option<String>,
    /// Whether this account may send private messages.
    pub can_send_messages: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The long-lived aggregate root for per-user data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: ProfileId,
    pub user_id: Option<UserId>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Raw stored location; see [`Profile::display_location`].
    pub location: Option<String>,
    pub time_zone: Option<String>,
    pub about_me: Option<String>,
    pub website: String,
    pub blog: String,
    pub flickr: String,
    /// Only changed through `Database::set_profile_active`.
    pub is_active: bool,
    pub icon: Option<AttachmentMeta>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn display_location(&self) -> &str {
        text::display_location(self.location.as_deref())
    }

    /// Full name given the owning user's login (if the user still exists).
    pub fn full_name_with(&self, login: Option<&str>) -> String {
        text::full_name(self.first_name.as_deref(), self.last_name.as_deref(), login)
    }

    /// True until the profile is edited for the first time.
    pub fn no_data(&self) -> bool {
        self.created_at == self.updated_at
    }
}

impl Commentable for Profile {
    fn addressable_id(&self) -> i64 {
        self.id.0
    }

    fn kind(&self) -> CommentableKind {
        CommentableKind::Profile
    }
}

// ---------------------------------------------------------------------------
// Friend edge
// ---------------------------------------------------------------------------

/// A directed edge from inviter to invited.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friend {
    pub id: FriendId,
    pub inviter_id: ProfileId,
    pub invited_id: ProfileId,
    pub status: FriendStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Forums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Forum {
    pub id: ForumId,
    pub name: String,
    pub description: Option<String>,
    /// 1-based position in the forum list.
    pub position: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Forum {
    pub fn to_param(&self) -> String {
        text::to_param(self.id.0, &self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForumTopic {
    pub id: TopicId,
    pub forum_id: ForumId,
    /// Profile that started the topic.
    pub owner_id: Option<ProfileId>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    /// Bumped whenever a post is added.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForumPost {
    pub id: PostId,
    pub topic_id: TopicId,
    pub owner_id: Option<ProfileId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Blogs and comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Blog {
    pub id: BlogId,
    pub profile_id: ProfileId,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Commentable for Blog {
    fn addressable_id(&self) -> i64 {
        self.id.0
    }

    fn kind(&self) -> CommentableKind {
        CommentableKind::Blog
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: CommentId,
    pub target: CommentTarget,
    /// Author.  `None` once the author's profile has been detached.
    pub profile_id: Option<ProfileId>,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A private message between two profiles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: Option<ProfileId>,
    pub receiver_id: Option<ProfileId>,
    pub subject: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// Something that happened, shown in the feeds it was published to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    pub id: FeedItemId,
    pub is_public: bool,
    /// Kind and id of the record the item is about.
    pub item_kind: EntityKind,
    pub item_id: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Photos
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Photo {
    pub id: PhotoId,
    pub profile_id: ProfileId,
    pub caption: Option<String>,
    pub image: Option<AttachmentMeta>,
    pub created_at: DateTime<Utc>,
}
