//! Forums, their topics and the posts in those topics.
//!
//! Forums form an ordered list (1-based `position`).  Topics and posts are
//! always removed with their forum regardless of the cascade policy.

use hearth_shared::params::AttributeFilter;
use hearth_shared::validation::{self, Validate};
use hearth_shared::{
    EntityKind, ForumId, PostId, ProfileId, RequestContext, TopicId, ValidationErrors,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cascade::{self, Relation};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::{check_reference, Entity};
use crate::models::{Forum, ForumPost, ForumTopic};
use crate::sql::{blank_to_none, encode_ts, missing, ts_at};

// ---------------------------------------------------------------------------
// Drafts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewForum {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for NewForum {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::presence(&mut errors, "name", Some(&self.name));
        errors
    }
}

impl Entity for Forum {
    type Draft = NewForum;
    const KIND: EntityKind = EntityKind::Forum;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTopic {
    pub forum_id: ForumId,
    /// Starter; falls back to the request's current profile.
    pub owner_id: Option<ProfileId>,
    pub title: String,
}

impl Validate for NewTopic {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::presence(&mut errors, "title", Some(&self.title));
        errors
    }
}

impl Entity for ForumTopic {
    type Draft = NewTopic;
    const KIND: EntityKind = EntityKind::ForumTopic;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPost {
    pub topic_id: TopicId,
    /// Author; falls back to the request's current profile.
    pub owner_id: Option<ProfileId>,
    pub body: String,
}

impl Validate for NewPost {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::presence(&mut errors, "body", Some(&self.body));
        errors
    }
}

impl Entity for ForumPost {
    type Draft = NewPost;
    const KIND: EntityKind = EntityKind::ForumPost;
}

/// Changes for [`Database::update_forum`].  `position` is changed through
/// [`Database::move_forum`] only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForumChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

const FORUM_ATTRIBUTES: AttributeFilter = AttributeFilter {
    immutable: &["id", "created_at"],
    protected: &["position", "updated_at"],
    permitted: &["name", "description"],
};

impl ForumChanges {
    pub fn from_params(params: &Value) -> std::result::Result<Self, ValidationErrors> {
        let mut attrs = FORUM_ATTRIBUTES.screen(params)?;
        Ok(Self {
            name: attrs.remove("name").map(Option::unwrap_or_default),
            description: attrs.remove("description"),
        })
    }
}

const FORUM_COLUMNS: &str = "id, name, description, position, created_at, updated_at";
const TOPIC_COLUMNS: &str = "id, forum_id, owner_id, title, created_at, updated_at";
const POST_COLUMNS: &str = "fp.id, fp.topic_id, fp.owner_id, fp.body, fp.created_at, fp.updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Forums
    // ------------------------------------------------------------------

    /// Create a forum at the end of the list.
    pub fn create_forum(&self, ctx: &RequestContext, mut new: NewForum) -> Result<Forum> {
        new.name = new.name.trim().to_string();
        self.hooks().forums.validate(ctx, &mut new, |_, _| Ok(()))?;

        let now = encode_ts(&ctx.now);
        self.conn().execute(
            "INSERT INTO forums (name, description, position, created_at, updated_at)
             VALUES (?1, ?2, (SELECT COALESCE(MAX(position), 0) + 1 FROM forums), ?3, ?3)",
            params![new.name, blank_to_none(new.description), now],
        )?;

        let forum = self.get_forum(ForumId(self.conn().last_insert_rowid()))?;
        tracing::info!(forum_id = %forum.id, position = forum.position, "created forum");
        self.hooks().forums.committed(ctx, &forum);
        Ok(forum)
    }

    pub fn get_forum(&self, id: ForumId) -> Result<Forum> {
        self.conn()
            .query_row(
                &format!("SELECT {FORUM_COLUMNS} FROM forums WHERE id = ?1"),
                params![id.0],
                row_to_forum,
            )
            .map_err(missing(EntityKind::Forum, id.0))
    }

    /// All forums by position.
    pub fn list_forums(&self) -> Result<Vec<Forum>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {FORUM_COLUMNS} FROM forums ORDER BY position ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_forum)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn update_forum(
        &self,
        ctx: &RequestContext,
        id: ForumId,
        changes: &ForumChanges,
    ) -> Result<Forum> {
        let existing = self.get_forum(id)?;
        let mut draft = NewForum {
            name: existing.name,
            description: existing.description,
        };
        if let Some(name) = &changes.name {
            draft.name = name.trim().to_string();
        }
        if let Some(description) = &changes.description {
            draft.description = description.clone();
        }
        self.hooks().forums.validate(ctx, &mut draft, |_, _| Ok(()))?;

        self.conn().execute(
            "UPDATE forums SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                draft.name,
                blank_to_none(draft.description),
                encode_ts(&ctx.now),
                id.0
            ],
        )?;

        let forum = self.get_forum(id)?;
        self.hooks().forums.committed(ctx, &forum);
        Ok(forum)
    }

    pub fn update_forum_from_params(
        &self,
        ctx: &RequestContext,
        id: ForumId,
        params: &Value,
    ) -> Result<Forum> {
        let changes = ForumChanges::from_params(params)?;
        self.update_forum(ctx, id, &changes)
    }

    /// Move a forum to `position` (clamped to the list) and renumber the
    /// forums in between.
    pub fn move_forum(&self, id: ForumId, position: i64) -> Result<Forum> {
        let tx = self.conn().unchecked_transaction()?;
        let forum = self.get_forum(id)?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM forums", [], |row| row.get(0))?;
        let target = position.clamp(1, count.max(1));
        let current = forum.position;

        if target < current {
            tx.execute(
                "UPDATE forums SET position = position + 1
                 WHERE position >= ?1 AND position < ?2",
                params![target, current],
            )?;
        } else if target > current {
            tx.execute(
                "UPDATE forums SET position = position - 1
                 WHERE position > ?1 AND position <= ?2",
                params![current, target],
            )?;
        }
        tx.execute(
            "UPDATE forums SET position = ?1 WHERE id = ?2",
            params![target, id.0],
        )?;
        tx.commit()?;

        tracing::debug!(forum_id = %id, from = current, to = target, "moved forum");
        self.get_forum(id)
    }

    /// Delete a forum with all of its topics and their posts, then close
    /// the gap in the position list.
    pub fn delete_forum(&self, id: ForumId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        let forum = self.get_forum(id)?;
        let policy = self.cascade_policy();

        let topic_ids: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM forum_topics WHERE forum_id = ?1")?;
            let rows = stmt.query_map(params![id.0], |row| row.get(0))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        };
        let mut posts = 0;
        for topic_id in &topic_ids {
            posts += cascade::resolve(&tx, policy, Relation::TopicPosts, *topic_id)?;
        }
        let topics = cascade::resolve(&tx, policy, Relation::ForumTopics, id.0)?;

        tx.execute("DELETE FROM forums WHERE id = ?1", params![id.0])?;
        tx.execute(
            "UPDATE forums SET position = position - 1 WHERE position > ?1",
            params![forum.position],
        )?;
        tx.commit()?;

        tracing::info!(forum_id = %id, topics, posts, "deleted forum");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    pub fn create_topic(&self, ctx: &RequestContext, mut new: NewTopic) -> Result<ForumTopic> {
        new.title = new.title.trim().to_string();
        if new.owner_id.is_none() {
            new.owner_id = ctx.current_profile;
        }
        self.hooks().topics.validate(ctx, &mut new, |draft, errors| {
            check_reference(errors, "forum_id", self.get_forum(draft.forum_id))?;
            if let Some(owner) = draft.owner_id {
                check_reference(errors, "owner_id", self.get_profile(owner))?;
            }
            Ok(())
        })?;

        let now = encode_ts(&ctx.now);
        self.conn().execute(
            "INSERT INTO forum_topics (forum_id, owner_id, title, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.forum_id.0, new.owner_id.map(|p| p.0), new.title, now],
        )?;

        let topic = self.get_topic(TopicId(self.conn().last_insert_rowid()))?;
        tracing::info!(topic_id = %topic.id, forum_id = %topic.forum_id, "created topic");
        self.hooks().topics.committed(ctx, &topic);
        Ok(topic)
    }

    pub fn get_topic(&self, id: TopicId) -> Result<ForumTopic> {
        self.conn()
            .query_row(
                &format!("SELECT {TOPIC_COLUMNS} FROM forum_topics WHERE id = ?1"),
                params![id.0],
                row_to_topic,
            )
            .map_err(missing(EntityKind::ForumTopic, id.0))
    }

    /// Most recently active topics first.
    pub fn topics_for_forum(&self, forum_id: ForumId) -> Result<Vec<ForumTopic>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TOPIC_COLUMNS} FROM forum_topics
             WHERE forum_id = ?1
             ORDER BY updated_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![forum_id.0], row_to_topic)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Ids of the topics `owner` started.
    pub(crate) fn topics_owned_by(&self, owner: ProfileId) -> Result<Vec<TopicId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id FROM forum_topics WHERE owner_id = ?1")?;
        let rows = stmt.query_map(params![owner.0], |row| row.get(0).map(TopicId))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Add a post and bump its topic's `updated_at` in one transaction.
    pub fn create_post(&self, ctx: &RequestContext, mut new: NewPost) -> Result<ForumPost> {
        if new.owner_id.is_none() {
            new.owner_id = ctx.current_profile;
        }
        self.hooks().posts.validate(ctx, &mut new, |draft, errors| {
            check_reference(errors, "topic_id", self.get_topic(draft.topic_id))?;
            if let Some(owner) = draft.owner_id {
                check_reference(errors, "owner_id", self.get_profile(owner))?;
            }
            Ok(())
        })?;

        let now = encode_ts(&ctx.now);
        let tx = self.conn().unchecked_transaction()?;
        tx.execute(
            "INSERT INTO forum_posts (topic_id, owner_id, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.topic_id.0, new.owner_id.map(|p| p.0), new.body, now],
        )?;
        let id = PostId(tx.last_insert_rowid());
        tx.execute(
            "UPDATE forum_topics SET updated_at = ?1 WHERE id = ?2",
            params![now, new.topic_id.0],
        )?;
        tx.commit()?;

        let post = self.get_post(id)?;
        tracing::info!(post_id = %post.id, topic_id = %post.topic_id, "created post");
        self.hooks().posts.committed(ctx, &post);
        Ok(post)
    }

    pub fn get_post(&self, id: PostId) -> Result<ForumPost> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM forum_posts fp WHERE fp.id = ?1"),
                params![id.0],
                row_to_post,
            )
            .map_err(missing(EntityKind::ForumPost, id.0))
    }

    /// Posts of a topic in reading order.
    pub fn posts_for_topic(&self, topic_id: TopicId) -> Result<Vec<ForumPost>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM forum_posts fp
                 WHERE fp.topic_id = ?1
                 ORDER BY fp.created_at ASC, fp.id ASC"
            ),
            topic_id.0,
        )
    }

    /// Every post in every topic of a forum, newest first.
    pub fn posts_for_forum(&self, forum_id: ForumId) -> Result<Vec<ForumPost>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM forum_posts fp
                 JOIN forum_topics t ON t.id = fp.topic_id
                 WHERE t.forum_id = ?1
                 ORDER BY fp.created_at DESC, fp.id DESC"
            ),
            forum_id.0,
        )
    }

    pub fn posts_by_profile(&self, owner: ProfileId) -> Result<Vec<ForumPost>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM forum_posts fp
                 WHERE fp.owner_id = ?1
                 ORDER BY fp.created_at DESC, fp.id DESC"
            ),
            owner.0,
        )
    }

    fn query_posts(&self, sql: &str, key: i64) -> Result<Vec<ForumPost>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![key], row_to_post)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_forum(row: &rusqlite::Row<'_>) -> rusqlite::Result<Forum> {
    Ok(Forum {
        id: ForumId(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        position: row.get(3)?,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}

fn row_to_topic(row: &rusqlite::Row<'_>) -> rusqlite::Result<ForumTopic> {
    Ok(ForumTopic {
        id: TopicId(row.get(0)?),
        forum_id: ForumId(row.get(1)?),
        owner_id: row.get::<_, Option<i64>>(2)?.map(ProfileId),
        title: row.get(3)?,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<ForumPost> {
    Ok(ForumPost {
        id: PostId(row.get(0)?),
        topic_id: TopicId(row.get(1)?),
        owner_id: row.get::<_, Option<i64>>(2)?.map(ProfileId),
        body: row.get(3)?,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::profiles::NewProfile;
    use hearth_shared::RuleKind;

    fn forum(db: &Database, name: &str) -> Forum {
        db.create_forum(
            &RequestContext::anonymous(),
            NewForum {
                name: name.into(),
                description: None,
            },
        )
        .unwrap()
    }

    fn profile(db: &Database, email: &str) -> ProfileId {
        db.create_profile(
            &RequestContext::anonymous(),
            NewProfile {
                email: email.into(),
                ..NewProfile::default()
            },
        )
        .unwrap()
        .id
    }

    fn positions(db: &Database) -> Vec<(String, i64)> {
        db.list_forums()
            .unwrap()
            .into_iter()
            .map(|f| (f.name, f.position))
            .collect()
    }

    #[test]
    fn forums_append_and_reorder() {
        let db = Database::open_in_memory().unwrap();
        forum(&db, "General");
        forum(&db, "Help");
        let c = forum(&db, "Off topic");
        assert_eq!(c.position, 3);
        assert_eq!(c.to_param(), format!("{}-off-topic", c.id));

        db.move_forum(c.id, 1).unwrap();
        assert_eq!(
            positions(&db),
            vec![
                ("Off topic".to_string(), 1),
                ("General".to_string(), 2),
                ("Help".to_string(), 3)
            ]
        );

        db.move_forum(c.id, 99).unwrap();
        assert_eq!(positions(&db).last().unwrap(), &("Off topic".to_string(), 3));
    }

    #[test]
    fn blank_forum_name_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_forum(&RequestContext::anonymous(), NewForum::default())
            .unwrap_err();
        assert!(err.validation().unwrap().has("name", RuleKind::Presence));
    }

    #[test]
    fn update_forum_rejects_position_and_id() {
        let db = Database::open_in_memory().unwrap();
        let f = forum(&db, "General");
        let ctx = RequestContext::anonymous();

        let err = db
            .update_forum_from_params(&ctx, f.id, &json!({ "id": 3, "position": 9 }))
            .unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has("id", RuleKind::Immutable));
        assert!(errors.has("position", RuleKind::Protected));

        let renamed = db
            .update_forum_from_params(&ctx, f.id, &json!({ "name": "Lobby" }))
            .unwrap();
        assert_eq!(renamed.name, "Lobby");
        assert_eq!(renamed.position, 1);
    }

    #[test]
    fn posting_bumps_topic() {
        let db = Database::open_in_memory().unwrap();
        let f = forum(&db, "General");
        let t0 = Utc::now();
        let old = db
            .create_topic(
                &RequestContext::anonymous().at(t0),
                NewTopic {
                    forum_id: f.id,
                    owner_id: None,
                    title: "old".into(),
                },
            )
            .unwrap();
        let new = db
            .create_topic(
                &RequestContext::anonymous().at(t0 + Duration::seconds(1)),
                NewTopic {
                    forum_id: f.id,
                    owner_id: None,
                    title: "new".into(),
                },
            )
            .unwrap();
        assert_eq!(db.topics_for_forum(f.id).unwrap()[0].id, new.id);

        db.create_post(
            &RequestContext::anonymous().at(t0 + Duration::seconds(2)),
            NewPost {
                topic_id: old.id,
                owner_id: None,
                body: "bump".into(),
            },
        )
        .unwrap();

        let topics = db.topics_for_forum(f.id).unwrap();
        assert_eq!(topics[0].id, old.id);
        assert_eq!(db.posts_for_forum(f.id).unwrap().len(), 1);
        assert_eq!(db.posts_for_topic(old.id).unwrap()[0].body, "bump");
    }

    #[test]
    fn missing_references_are_field_errors() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_topic(
                &RequestContext::for_profile(ProfileId(42), None),
                NewTopic {
                    forum_id: ForumId(7),
                    owner_id: None,
                    title: " ".into(),
                },
            )
            .unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has("forum_id", RuleKind::Invalid));
        assert!(errors.has("owner_id", RuleKind::Invalid));
        assert!(errors.has("title", RuleKind::Presence));

        let err = db
            .create_post(
                &RequestContext::anonymous(),
                NewPost {
                    topic_id: TopicId(3),
                    owner_id: None,
                    body: "b".into(),
                },
            )
            .unwrap_err();
        assert!(err.validation().unwrap().has("topic_id", RuleKind::Invalid));
    }

    #[test]
    fn topic_owner_defaults_to_current_profile() {
        let db = Database::open_in_memory().unwrap();
        let f = forum(&db, "General");
        let owner = profile(&db, "starter@x.com");

        let topic = db
            .create_topic(
                &RequestContext::for_profile(owner, None),
                NewTopic {
                    forum_id: f.id,
                    owner_id: None,
                    title: "hello".into(),
                },
            )
            .unwrap();
        assert_eq!(topic.owner_id, Some(owner));
        assert_eq!(db.topics_owned_by(owner).unwrap(), vec![topic.id]);

        let anonymous = db
            .create_topic(
                &RequestContext::anonymous(),
                NewTopic {
                    forum_id: f.id,
                    owner_id: None,
                    title: "anon".into(),
                },
            )
            .unwrap();
        assert_eq!(anonymous.owner_id, None);
    }

    #[test]
    fn deleting_the_starter_keeps_the_topic() {
        let db = Database::open_in_memory().unwrap();
        let f = forum(&db, "General");
        let starter = profile(&db, "starter@x.com");
        let other = profile(&db, "other@x.com");

        let topic = db
            .create_topic(
                &RequestContext::for_profile(starter, None),
                NewTopic {
                    forum_id: f.id,
                    owner_id: None,
                    title: "hello".into(),
                },
            )
            .unwrap();
        let reply = db
            .create_post(
                &RequestContext::for_profile(other, None),
                NewPost {
                    topic_id: topic.id,
                    owner_id: None,
                    body: "reply".into(),
                },
            )
            .unwrap();

        db.delete_profile(starter).unwrap();
        assert_eq!(db.get_topic(topic.id).unwrap().owner_id, None);
        assert_eq!(db.get_post(reply.id).unwrap().owner_id, Some(other));
    }

    #[test]
    fn cascading_topics_takes_their_posts() {
        let policy = crate::cascade::CascadePolicy::default()
            .with(Relation::ProfileForumTopics, crate::cascade::DeleteRule::Cascade)
            .unwrap();
        let db = Database::open_in_memory()
            .unwrap()
            .with_cascade_policy(policy)
            .unwrap();
        let f = forum(&db, "General");
        let starter = profile(&db, "starter@x.com");
        let other = profile(&db, "other@x.com");

        let topic = db
            .create_topic(
                &RequestContext::for_profile(starter, None),
                NewTopic {
                    forum_id: f.id,
                    owner_id: None,
                    title: "hello".into(),
                },
            )
            .unwrap();
        let reply = db
            .create_post(
                &RequestContext::for_profile(other, None),
                NewPost {
                    topic_id: topic.id,
                    owner_id: None,
                    body: "reply".into(),
                },
            )
            .unwrap();

        db.delete_profile(starter).unwrap();
        assert!(db.get_topic(topic.id).unwrap_err().is_not_found());
        assert!(db.get_post(reply.id).unwrap_err().is_not_found());
        assert!(db.get_profile(other).is_ok());
    }

    #[test]
    fn delete_forum_removes_topics_and_posts() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::anonymous();
        let first = forum(&db, "First");
        let doomed = forum(&db, "Doomed");
        forum(&db, "Last");

        let topic = db
            .create_topic(
                &ctx,
                NewTopic {
                    forum_id: doomed.id,
                    owner_id: None,
                    title: "t".into(),
                },
            )
            .unwrap();
        let post = db
            .create_post(
                &ctx,
                NewPost {
                    topic_id: topic.id,
                    owner_id: None,
                    body: "b".into(),
                },
            )
            .unwrap();

        db.delete_forum(doomed.id).unwrap();
        assert!(db.get_forum(doomed.id).unwrap_err().is_not_found());
        assert!(db.get_topic(topic.id).unwrap_err().is_not_found());
        assert!(db.get_post(post.id).unwrap_err().is_not_found());
        assert_eq!(
            positions(&db),
            vec![("First".to_string(), 1), ("Last".to_string(), 2)]
        );
        assert_eq!(db.get_forum(first.id).unwrap().position, 1);
    }
}
