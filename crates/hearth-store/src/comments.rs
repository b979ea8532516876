//! Comments on a profile's wall or on a blog entry.

use hearth_shared::validation::{self, Validate};
use hearth_shared::{
    CommentId, CommentTarget, Commentable, CommentableKind, EntityKind, Page, Paginated,
    ProfileId, RequestContext, RuleKind, ValidationErrors,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::{check_reference, Entity};
use crate::models::Comment;
use crate::sql::{conversion_error, encode_ts, missing, ts_at};

/// Candidate for [`Database::create_comment`].  The author is taken from
/// the request context and is required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub target: CommentTarget,
    pub body: String,
}

impl Validate for NewComment {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::presence(&mut errors, "body", Some(&self.body));
        errors
    }
}

impl Entity for Comment {
    type Draft = NewComment;
    const KIND: EntityKind = EntityKind::Comment;
}

pub(crate) const COMMENT_COLUMNS: &str =
    "c.id, c.commentable_type, c.commentable_id, c.profile_id, c.body, c.created_at";

impl Database {
    /// Post a comment as `ctx.current_profile`.
    pub fn create_comment(&self, ctx: &RequestContext, mut new: NewComment) -> Result<Comment> {
        self.hooks().comments.validate(ctx, &mut new, |draft, errors| {
            match ctx.current_profile {
                Some(author) => {
                    check_reference(errors, "profile_id", self.get_profile(author))?;
                }
                None => errors.add("profile_id", RuleKind::Presence, validation::MSG_BLANK),
            }
            check_reference(errors, "commentable_id", self.ensure_target(draft.target))?;
            Ok(())
        })?;

        self.conn().execute(
            "INSERT INTO comments (commentable_type, commentable_id, profile_id, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                new.target.kind().as_str(),
                new.target.addressable_id(),
                ctx.current_profile.map(|p| p.0),
                new.body,
                encode_ts(&ctx.now),
            ],
        )?;

        let comment = self.get_comment(CommentId(self.conn().last_insert_rowid()))?;
        tracing::info!(
            comment_id = %comment.id,
            target = comment.target.kind().as_str(),
            target_id = comment.target.addressable_id(),
            "created comment"
        );
        self.hooks().comments.committed(ctx, &comment);
        Ok(comment)
    }

    pub fn get_comment(&self, id: CommentId) -> Result<Comment> {
        self.conn()
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ?1"),
                params![id.0],
                row_to_comment,
            )
            .map_err(missing(EntityKind::Comment, id.0))
    }

    /// Comments on `target`, newest first.
    pub fn comments_for(
        &self,
        target: &impl Commentable,
        page: Page,
    ) -> Result<Paginated<Comment>> {
        let kind = target.kind().as_str();
        let id = target.addressable_id();

        let total: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM comments WHERE commentable_type = ?1 AND commentable_id = ?2",
            params![kind, id],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c
             WHERE c.commentable_type = ?1 AND c.commentable_id = ?2
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt.query_map(
            params![kind, id, page.limit(), page.offset()],
            row_to_comment,
        )?;
        let items = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, total as u64))
    }

    /// Most recent comments anywhere.
    pub fn latest_comments(&self, limit: u32) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_comment)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn delete_comment(&self, id: CommentId) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM comments WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Comment, id.0));
        }
        tracing::info!(comment_id = %id, "deleted comment");
        Ok(())
    }

    fn ensure_target(&self, target: CommentTarget) -> Result<()> {
        match target {
            CommentTarget::Profile(id) => self.get_profile(id).map(|_| ()),
            CommentTarget::Blog(id) => self.get_blog(id).map(|_| ()),
        }
    }
}

pub(crate) fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let raw_kind: String = row.get(1)?;
    let kind = CommentableKind::parse(&raw_kind)
        .ok_or_else(|| conversion_error(1, format!("unknown commentable type {raw_kind}")))?;
    Ok(Comment {
        id: CommentId(row.get(0)?),
        target: CommentTarget::from_parts(kind, row.get(2)?),
        profile_id: row.get::<_, Option<i64>>(3)?.map(ProfileId),
        body: row.get(4)?,
        created_at: ts_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::blogs::NewBlog;
    use crate::profiles::NewProfile;
    use hearth_shared::BlogId;

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

    #[test]
    fn wall_comments_page_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let wall = profile(&db, "wall@x.com");
        let author = profile(&db, "author@x.com");
        let t0 = Utc::now();
        for i in 0..3 {
            db.create_comment(
                &RequestContext::for_profile(author, None).at(t0 + Duration::seconds(i)),
                NewComment {
                    target: CommentTarget::Profile(wall),
                    body: format!("c{i}"),
                },
            )
            .unwrap();
        }

        let page = db
            .comments_for(&CommentTarget::Profile(wall), Page::new(1, 2))
            .unwrap();
        assert_eq!(page.total_entries, 3);
        assert_eq!(page.total_pages(), 2);
        let bodies: Vec<_> = page.items.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["c2", "c1"]);
        assert_eq!(page.items[0].profile_id, Some(author));
    }

    #[test]
    fn blog_comments_use_the_blog_as_target() {
        let db = Database::open_in_memory().unwrap();
        let writer = profile(&db, "writer@x.com");
        let blog = db
            .create_blog(
                &RequestContext::anonymous(),
                NewBlog {
                    profile_id: writer,
                    title: "t".into(),
                    body: "b".into(),
                },
            )
            .unwrap();

        let reader = profile(&db, "reader@x.com");
        let comment = db
            .create_comment(
                &RequestContext::for_profile(reader, None),
                NewComment {
                    target: blog.comment_target(),
                    body: "nice".into(),
                },
            )
            .unwrap();
        assert_eq!(comment.target, CommentTarget::Blog(blog.id));
        assert_eq!(comment.profile_id, Some(reader));

        let on_blog = db.comments_for(&blog, Page::default()).unwrap();
        assert_eq!(on_blog.items, vec![comment.clone()]);
        assert!(db
            .comments_for(&CommentTarget::Profile(writer), Page::default())
            .unwrap()
            .items
            .is_empty());
        assert_eq!(db.latest_comments(5).unwrap(), vec![comment]);
    }

    #[test]
    fn missing_target_is_a_field_error() {
        let db = Database::open_in_memory().unwrap();
        let author = profile(&db, "author@x.com");
        let err = db
            .create_comment(
                &RequestContext::for_profile(author, None),
                NewComment {
                    target: CommentTarget::Blog(BlogId(5)),
                    body: " ".into(),
                },
            )
            .unwrap_err();
        let errors = err.validation().unwrap();
        assert!(errors.has("commentable_id", RuleKind::Invalid));
        assert!(errors.has("body", RuleKind::Presence));
    }

    #[test]
    fn anonymous_comment_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let wall = profile(&db, "wall@x.com");
        let err = db
            .create_comment(
                &RequestContext::anonymous(),
                NewComment {
                    target: CommentTarget::Profile(wall),
                    body: "hi".into(),
                },
            )
            .unwrap_err();
        assert!(err.validation().unwrap().has("profile_id", RuleKind::Presence));
        assert!(db.latest_comments(5).unwrap().is_empty());

        let err = db
            .create_comment(
                &RequestContext::for_profile(ProfileId(404), None),
                NewComment {
                    target: CommentTarget::Profile(wall),
                    body: "hi".into(),
                },
            )
            .unwrap_err();
        assert!(err.validation().unwrap().has("profile_id", RuleKind::Invalid));
    }

    #[test]
    fn blank_body_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let wall = profile(&db, "wall@x.com");
        let err = db
            .create_comment(
                &RequestContext::anonymous(),
                NewComment {
                    target: CommentTarget::Profile(wall),
                    body: "  ".into(),
                },
            )
            .unwrap_err();
        assert!(err.validation().unwrap().has("body", RuleKind::Presence));
    }

    #[test]
    fn delete_comment_twice_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let wall = profile(&db, "wall@x.com");
        let comment = db
            .create_comment(
                &RequestContext::for_profile(wall, None),
                NewComment {
                    target: CommentTarget::Profile(wall),
                    body: "hi".into(),
                },
            )
            .unwrap();
        db.delete_comment(comment.id).unwrap();
        assert!(db.delete_comment(comment.id).unwrap_err().is_not_found());
    }
}
