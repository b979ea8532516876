//! v004 -- Topic owners.
//!
//! The link is nullable so a deleted owner can be detached while the topic
//! and everyone else's posts in it stay.

use rusqlite::Connection;

/// SQL executed when upgrading from version 3 to version 4.
const UP_SQL: &str = r#"
ALTER TABLE forum_topics ADD COLUMN owner_id INTEGER REFERENCES profiles(id);

CREATE INDEX IF NOT EXISTS idx_forum_topics_owner ON forum_topics(owner_id);
"#;

/// Apply the topic-owner migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
