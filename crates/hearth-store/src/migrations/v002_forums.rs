//! v002 -- Forums, topics and posts.
//!
//! Forum -> topics -> posts is the one hard-wired cascade, so these links
//! carry `ON DELETE CASCADE`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 1 to version 2.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS forums (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    description TEXT,
    position    INTEGER NOT NULL,             -- 1-based list position
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_forums_position ON forums(position);

CREATE TABLE IF NOT EXISTS forum_topics (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    forum_id    INTEGER NOT NULL,
    title       TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (forum_id) REFERENCES forums(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_forum_topics_forum ON forum_topics(forum_id, updated_at DESC);

CREATE TABLE IF NOT EXISTS forum_posts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    topic_id    INTEGER NOT NULL,
    owner_id    INTEGER,                      -- nullable FK -> profiles(id)
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,

    FOREIGN KEY (topic_id) REFERENCES forum_topics(id) ON DELETE CASCADE,
    FOREIGN KEY (owner_id) REFERENCES profiles(id)
);

CREATE INDEX IF NOT EXISTS idx_forum_posts_topic ON forum_posts(topic_id, created_at);
CREATE INDEX IF NOT EXISTS idx_forum_posts_owner ON forum_posts(owner_id);
"#;

/// Apply the forum migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
