//! v001 -- Initial schema creation.
//!
//! Users, profiles and everything hanging off a profile: friend edges,
//! messages, blogs, comments, feeds and photos.
//!
//! Links to `profiles(id)` carry no `ON DELETE` action: the store applies
//! the configured cascade policy itself, and the foreign key turns any
//! dependent it missed into a hard error instead of an orphan.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    login             TEXT NOT NULL UNIQUE COLLATE NOCASE,
    crypted_password  TEXT,
    salt              TEXT,
    can_send_messages INTEGER NOT NULL DEFAULT 1,   -- boolean 0/1
    created_at        TEXT NOT NULL                 -- RFC-3339, UTC
);

-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id           INTEGER,                      -- nullable FK -> users(id)
    email             TEXT NOT NULL UNIQUE COLLATE NOCASE,
    first_name        TEXT,
    last_name         TEXT,
    location          TEXT,
    time_zone         TEXT,
    about_me          TEXT,
    website           TEXT NOT NULL DEFAULT '',
    blog              TEXT NOT NULL DEFAULT '',
    flickr            TEXT NOT NULL DEFAULT '',
    is_active         INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    icon_file_name    TEXT,
    icon_content_type TEXT,
    icon_file_size    INTEGER,
    icon_updated_at   TEXT,
    last_activity_at  TEXT,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL,

    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_user_id ON profiles(user_id);
CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles(created_at DESC);

-- ----------------------------------------------------------------
-- Friend edges (directed inviter -> invited)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friends (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    inviter_id  INTEGER NOT NULL,
    invited_id  INTEGER NOT NULL,
    status      INTEGER NOT NULL DEFAULT 0,   -- 0 pending, 1 accepted
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    CHECK (inviter_id != invited_id),
    FOREIGN KEY (inviter_id) REFERENCES profiles(id),
    FOREIGN KEY (invited_id) REFERENCES profiles(id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_friends_pair ON friends(inviter_id, invited_id);
CREATE INDEX IF NOT EXISTS idx_friends_invited ON friends(invited_id, status);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_id   INTEGER,                      -- nullable: detached on delete
    receiver_id INTEGER,                      -- nullable: detached on delete
    subject     TEXT NOT NULL DEFAULT '',
    body        TEXT NOT NULL,
    read        INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    created_at  TEXT NOT NULL,

    FOREIGN KEY (sender_id) REFERENCES profiles(id),
    FOREIGN KEY (receiver_id) REFERENCES profiles(id)
);

CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, read);
CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id, created_at DESC);

-- ----------------------------------------------------------------
-- Blogs
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS blogs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id  INTEGER NOT NULL,
    title       TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (profile_id) REFERENCES profiles(id)
);

CREATE INDEX IF NOT EXISTS idx_blogs_profile ON blogs(profile_id, created_at DESC);

-- ----------------------------------------------------------------
-- Comments (polymorphic target: no FK on commentable_id)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    commentable_type TEXT NOT NULL,           -- 'Profile' | 'Blog'
    commentable_id   INTEGER NOT NULL,
    profile_id       INTEGER,                 -- author; nullable: detached on delete
    body             TEXT NOT NULL,
    created_at       TEXT NOT NULL,

    FOREIGN KEY (profile_id) REFERENCES profiles(id)
);

CREATE INDEX IF NOT EXISTS idx_comments_target
    ON comments(commentable_type, commentable_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(profile_id);

-- ----------------------------------------------------------------
-- Feed items, fanned out to profiles through feeds
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS feed_items (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    is_public   INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    item_type   TEXT NOT NULL,
    item_id     INTEGER NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS feeds (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id   INTEGER NOT NULL,
    feed_item_id INTEGER NOT NULL,

    FOREIGN KEY (profile_id) REFERENCES profiles(id),
    FOREIGN KEY (feed_item_id) REFERENCES feed_items(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_feeds_unique ON feeds(profile_id, feed_item_id);

-- ----------------------------------------------------------------
-- Photos (image bytes live with the attachment service)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS photos (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id         INTEGER NOT NULL,
    caption            TEXT,
    image_file_name    TEXT,
    image_content_type TEXT,
    image_file_size    INTEGER,
    image_updated_at   TEXT,
    created_at         TEXT NOT NULL,

    FOREIGN KEY (profile_id) REFERENCES profiles(id)
);

CREATE INDEX IF NOT EXISTS idx_photos_profile ON photos(profile_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
