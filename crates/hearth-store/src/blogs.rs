//! Blog entries written by a profile.

use hearth_shared::validation::{self, Validate};
use hearth_shared::{BlogId, EntityKind, ProfileId, RequestContext, ValidationErrors};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::cascade::{self, Relation};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::{check_reference, Entity};
use crate::models::Blog;
use crate::sql::{encode_ts, missing, ts_at};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlog {
    pub profile_id: ProfileId,
    pub title: String,
    pub body: String,
}

impl Validate for NewBlog {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::presence(&mut errors, "title", Some(&self.title));
        validation::presence(&mut errors, "body", Some(&self.body));
        errors
    }
}

impl Entity for Blog {
    type Draft = NewBlog;
    const KIND: EntityKind = EntityKind::Blog;
}

const BLOG_COLUMNS: &str = "id, profile_id, title, body, created_at, updated_at";

impl Database {
    pub fn create_blog(&self, ctx: &RequestContext, mut new: NewBlog) -> Result<Blog> {
        new.title = new.title.trim().to_string();
        self.hooks().blogs.validate(ctx, &mut new, |draft, errors| {
            check_reference(errors, "profile_id", self.get_profile(draft.profile_id)).map(|_| ())
        })?;

        let now = encode_ts(&ctx.now);
        self.conn().execute(
            "INSERT INTO blogs (profile_id, title, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![new.profile_id.0, new.title, new.body, now],
        )?;

        let blog = self.get_blog(BlogId(self.conn().last_insert_rowid()))?;
        tracing::info!(blog_id = %blog.id, profile_id = %blog.profile_id, "created blog");
        self.hooks().blogs.committed(ctx, &blog);
        Ok(blog)
    }

    pub fn get_blog(&self, id: BlogId) -> Result<Blog> {
        self.conn()
            .query_row(
                &format!("SELECT {BLOG_COLUMNS} FROM blogs WHERE id = ?1"),
                params![id.0],
                row_to_blog,
            )
            .map_err(missing(EntityKind::Blog, id.0))
    }

    /// Newest first.
    pub fn blogs_for_profile(&self, profile_id: ProfileId) -> Result<Vec<Blog>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {BLOG_COLUMNS} FROM blogs
             WHERE profile_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![profile_id.0], row_to_blog)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Delete a blog entry; its comments follow the `blog_comments` rule.
    pub fn delete_blog(&self, id: BlogId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        self.get_blog(id)?;
        cascade::resolve(&tx, self.cascade_policy(), Relation::BlogComments, id.0)?;
        tx.execute("DELETE FROM blogs WHERE id = ?1", params![id.0])?;
        tx.commit()?;

        tracing::info!(blog_id = %id, "deleted blog");
        Ok(())
    }
}

fn row_to_blog(row: &rusqlite::Row<'_>) -> rusqlite::Result<Blog> {
    Ok(Blog {
        id: BlogId(row.get(0)?),
        profile_id: ProfileId(row.get(1)?),
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}
