//! CRUD operations for [`Profile`] records.
//!
//! A profile is the aggregate root for per-user data, so its delete is the
//! one that walks the cascade policy for every dependent relation.

use hearth_shared::params::{AttributeFilter, Attributes};
use hearth_shared::validation::{self, Validate, MSG_TAKEN};
use hearth_shared::{
    text, AttachmentMeta, EntityKind, Page, Paginated, ProfileId, RequestContext, RuleKind,
    UserId, ValidationErrors,
};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cascade::{self, DeleteRule, Relation};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::{check_reference, Entity};
use crate::models::Profile;
use crate::sql::{blank_to_none, encode_ts, missing, opt_ts_at, ts_at, unique_or_sqlite};

/// Candidate for [`Database::create_profile`]; also the draft every profile
/// update is validated as.  `is_active` is deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewProfile {
    pub user_id: Option<UserId>,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub location: Option<String>,
    pub time_zone: Option<String>,
    pub about_me: Option<String>,
    pub website: String,
    pub blog: String,
    pub flickr: String,
}

impl Validate for NewProfile {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::email(&mut errors, "email", &self.email);
        errors
    }
}

impl Entity for Profile {
    type Draft = NewProfile;
    const KIND: EntityKind = EntityKind::Profile;
}

/// Attribute changes for [`Database::update_profile`].  `None` leaves a
/// field alone; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileChanges {
    pub email: Option<String>,
    pub first_name: Option<Option<String>>,
    pub last_name: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub time_zone: Option<Option<String>>,
    pub about_me: Option<Option<String>>,
    pub website: Option<String>,
    pub blog: Option<String>,
    pub flickr: Option<String>,
}

const PROFILE_ATTRIBUTES: AttributeFilter = AttributeFilter {
    immutable: &["id", "created_at"],
    protected: &[
        "is_active",
        "user_id",
        "icon_file_name",
        "icon_content_type",
        "icon_file_size",
        "icon_updated_at",
        "last_activity_at",
        "updated_at",
    ],
    permitted: &[
        "email",
        "first_name",
        "last_name",
        "location",
        "time_zone",
        "about_me",
        "website",
        "blog",
        "flickr",
    ],
};

impl ProfileChanges {
    /// Build changes from caller-supplied attributes, rejecting `id`
    /// (immutable) and `is_active` (protected) among others.
    pub fn from_params(params: &Value) -> std::result::Result<Self, ValidationErrors> {
        let attrs = PROFILE_ATTRIBUTES.screen(params)?;
        Ok(Self::from_attributes(attrs))
    }

    fn from_attributes(mut attrs: Attributes) -> Self {
        let mut take = |name: &str| attrs.remove(name);
        Self {
            email: take("email").map(Option::unwrap_or_default),
            first_name: take("first_name"),
            last_name: take("last_name"),
            location: take("location"),
            time_zone: take("time_zone"),
            about_me: take("about_me"),
            website: take("website").map(Option::unwrap_or_default),
            blog: take("blog").map(Option::unwrap_or_default),
            flickr: take("flickr").map(Option::unwrap_or_default),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(&self, draft: &mut NewProfile) {
        if let Some(email) = &self.email {
            draft.email = email.trim().to_string();
        }
        let optional = [
            (&self.first_name, &mut draft.first_name),
            (&self.last_name, &mut draft.last_name),
            (&self.location, &mut draft.location),
            (&self.time_zone, &mut draft.time_zone),
            (&self.about_me, &mut draft.about_me),
        ];
        for (change, field) in optional {
            if let Some(value) = change {
                *field = value.clone();
            }
        }
        if let Some(v) = &self.website {
            draft.website = v.clone();
        }
        if let Some(v) = &self.blog {
            draft.blog = v.clone();
        }
        if let Some(v) = &self.flickr {
            draft.flickr = v.clone();
        }
    }
}

impl From<&Profile> for NewProfile {
    fn from(p: &Profile) -> Self {
        Self {
            user_id: p.user_id,
            email: p.email.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            location: p.location.clone(),
            time_zone: p.time_zone.clone(),
            about_me: p.about_me.clone(),
            website: p.website.clone(),
            blog: p.blog.clone(),
            flickr: p.flickr.clone(),
        }
    }
}

/// Column list for `profiles p`; shared with the relationship queries.
pub(crate) const PROFILE_COLUMNS: &str = "p.id, p.user_id, p.email, p.first_name, p.last_name, \
     p.location, p.time_zone, p.about_me, p.website, p.blog, p.flickr, p.is_active, \
     p.icon_file_name, p.icon_content_type, p.icon_file_size, p.icon_updated_at, \
     p.last_activity_at, p.created_at, p.updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_profile(&self, ctx: &RequestContext, mut new: NewProfile) -> Result<Profile> {
        new.email = new.email.trim().to_string();
        self.hooks().profiles.validate(ctx, &mut new, |draft, errors| {
            self.check_profile_rules(draft, None, errors)
        })?;

        let now = encode_ts(&ctx.now);
        self.conn()
            .execute(
                "INSERT INTO profiles (user_id, email, email_key, first_name, last_name, location,
                                       time_zone, about_me, website, blog, flickr, is_active,
                                       created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, ?12)",
                params![
                    new.user_id.map(|u| u.0),
                    new.email,
                    text::case_key(&new.email),
                    blank_to_none(new.first_name),
                    blank_to_none(new.last_name),
                    blank_to_none(new.location),
                    blank_to_none(new.time_zone),
                    blank_to_none(new.about_me),
                    new.website,
                    new.blog,
                    new.flickr,
                    now,
                ],
            )
            .map_err(profile_write_error)?;

        let profile = self.get_profile(ProfileId(self.conn().last_insert_rowid()))?;
        tracing::info!(profile_id = %profile.id, "created profile");
        self.hooks().profiles.committed(ctx, &profile);
        Ok(profile)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_profile(&self, id: ProfileId) -> Result<Profile> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.id = ?1"),
                params![id.0],
                row_to_profile,
            )
            .map_err(missing(EntityKind::Profile, id.0))
    }

    /// Case-insensitive lookup, Unicode included.
    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.email_key = ?1"),
                params![text::case_key(email)],
                row_to_profile,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn get_profile_for_user(&self, user_id: UserId) -> Result<Option<Profile>> {
        self.conn()
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.user_id = ?1"),
                params![user_id.0],
                row_to_profile,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    /// All profiles, newest first.
    pub fn list_profiles(&self, page: Page) -> Result<Paginated<Profile>> {
        let total: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![page.limit(), page.offset()], row_to_profile)?;
        let items = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, total as u64))
    }

    /// Most recently created active profiles.
    pub fn newest_profiles(&self, limit: u32) -> Result<Vec<Profile>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p
             WHERE p.is_active = 1
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit], row_to_profile)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Display name, falling back to the login or the deleted-user marker.
    pub fn profile_full_name(&self, profile: &Profile) -> Result<String> {
        let login = match profile.user_id {
            Some(user_id) => self
                .conn()
                .query_row(
                    "SELECT login FROM users WHERE id = ?1",
                    params![user_id.0],
                    |row| row.get::<_, String>(0),
                )
                .optional()?,
            None => None,
        };
        Ok(profile.full_name_with(login.as_deref()))
    }

    /// `"{id}-{full-name-slug}"`.
    pub fn profile_param(&self, profile: &Profile) -> Result<String> {
        Ok(text::to_param(profile.id.0, &self.profile_full_name(profile)?))
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn update_profile(
        &self,
        ctx: &RequestContext,
        id: ProfileId,
        changes: &ProfileChanges,
    ) -> Result<Profile> {
        let existing = self.get_profile(id)?;
        let mut draft = NewProfile::from(&existing);
        changes.apply(&mut draft);

        self.hooks().profiles.validate(ctx, &mut draft, |draft, errors| {
            self.check_profile_rules(draft, Some(id), errors)
        })?;

        self.conn()
            .execute(
                "UPDATE profiles
                 SET email = ?1, email_key = ?2, first_name = ?3, last_name = ?4, location = ?5,
                     time_zone = ?6, about_me = ?7, website = ?8, blog = ?9, flickr = ?10,
                     updated_at = ?11
                 WHERE id = ?12",
                params![
                    draft.email,
                    text::case_key(&draft.email),
                    blank_to_none(draft.first_name),
                    blank_to_none(draft.last_name),
                    blank_to_none(draft.location),
                    blank_to_none(draft.time_zone),
                    blank_to_none(draft.about_me),
                    draft.website,
                    draft.blog,
                    draft.flickr,
                    encode_ts(&ctx.now),
                    id.0,
                ],
            )
            .map_err(profile_write_error)?;

        let profile = self.get_profile(id)?;
        tracing::debug!(profile_id = %id, "updated profile");
        self.hooks().profiles.committed(ctx, &profile);
        Ok(profile)
    }

    /// Screen caller-supplied attributes, then update.
    pub fn update_profile_from_params(
        &self,
        ctx: &RequestContext,
        id: ProfileId,
        params: &Value,
    ) -> Result<Profile> {
        let changes = ProfileChanges::from_params(params)?;
        self.update_profile(ctx, id, &changes)
    }

    /// Internal activation switch; not reachable through attribute updates.
    pub fn set_profile_active(&self, id: ProfileId, active: bool) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE profiles SET is_active = ?1 WHERE id = ?2",
            params![active as i32, id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Profile, id.0));
        }
        Ok(())
    }

    /// Record that the current profile was seen at `ctx.now`.  Leaves
    /// `updated_at` alone.  A no-op for anonymous requests.
    pub fn touch_last_activity(&self, ctx: &RequestContext) -> Result<()> {
        let Some(id) = ctx.current_profile else {
            return Ok(());
        };
        let affected = self.conn().execute(
            "UPDATE profiles SET last_activity_at = ?1 WHERE id = ?2",
            params![encode_ts(&ctx.now), id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Profile, id.0));
        }
        Ok(())
    }

    /// Persist the metadata of a freshly stored icon.
    pub fn set_profile_icon(&self, id: ProfileId, icon: &AttachmentMeta) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE profiles
             SET icon_file_name = ?1, icon_content_type = ?2, icon_file_size = ?3,
                 icon_updated_at = ?4
             WHERE id = ?5",
            params![
                icon.file_name,
                icon.content_type,
                icon.file_size,
                encode_ts(&icon.updated_at),
                id.0,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Profile, id.0));
        }
        Ok(())
    }

    pub fn clear_profile_icon(&self, id: ProfileId) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE profiles
             SET icon_file_name = NULL, icon_content_type = NULL, icon_file_size = NULL,
                 icon_updated_at = NULL
             WHERE id = ?1",
            params![id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Profile, id.0));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a profile, settling every dependent relation by the cascade
    /// policy.  Any `Restrict` relation with rows aborts the whole delete.
    pub fn delete_profile(&self, id: ProfileId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        self.get_profile(id)?;

        self.resolve_profile_dependents(id)?;
        tx.execute("DELETE FROM profiles WHERE id = ?1", params![id.0])?;
        tx.commit()?;

        tracing::info!(profile_id = %id, "deleted profile");
        Ok(())
    }

    /// Runs inside the caller's transaction.
    pub(crate) fn resolve_profile_dependents(&self, id: ProfileId) -> Result<()> {
        let policy = self.cascade_policy();
        for relation in Relation::PROFILE_DEPENDENTS {
            let cascades = policy.rule(relation) == DeleteRule::Cascade;
            if relation == Relation::ProfileBlogs && cascades {
                for blog in self.blogs_for_profile(id)? {
                    cascade::resolve(self.conn(), policy, Relation::BlogComments, blog.id.0)?;
                }
            }
            if relation == Relation::ProfileForumTopics && cascades {
                for topic in self.topics_owned_by(id)? {
                    cascade::resolve(self.conn(), policy, Relation::TopicPosts, topic.0)?;
                }
            }

            // Only items that were in this profile's feed may become orphans.
            let feed_items = if relation == Relation::ProfileFeeds {
                self.feed_item_ids_for(id)?
            } else {
                Vec::new()
            };

            cascade::resolve(self.conn(), policy, relation, id.0)?;

            if !feed_items.is_empty() {
                self.purge_orphan_feed_items(&feed_items)?;
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    fn check_profile_rules(
        &self,
        draft: &NewProfile,
        except: Option<ProfileId>,
        errors: &mut ValidationErrors,
    ) -> Result<()> {
        if !draft.email.is_empty() {
            let taken: bool = self.conn().query_row(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE email_key = ?1 AND id IS NOT ?2)",
                params![text::case_key(&draft.email), except.map(|p| p.0)],
                |row| row.get(0),
            )?;
            if taken {
                errors.add("email", RuleKind::Uniqueness, MSG_TAKEN);
            }
        }

        if let Some(user_id) = draft.user_id {
            if check_reference(errors, "user_id", self.get_user(user_id))?.is_none() {
                return Ok(());
            }
            let owned: bool = self.conn().query_row(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE user_id = ?1 AND id IS NOT ?2)",
                params![user_id.0, except.map(|p| p.0)],
                |row| row.get(0),
            )?;
            if owned {
                errors.add("user_id", RuleKind::Uniqueness, MSG_TAKEN);
            }
        }
        Ok(())
    }
}

fn profile_write_error(err: rusqlite::Error) -> StoreError {
    if crate::sql::is_unique_violation(&err, "profiles.user_id") {
        return unique_or_sqlite(err, "profiles.user_id", "user_id");
    }
    if crate::sql::is_unique_violation(&err, "profiles.email_key") {
        return unique_or_sqlite(err, "profiles.email_key", "email");
    }
    unique_or_sqlite(err, "profiles.email", "email")
}

pub(crate) fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let is_active: i32 = row.get(11)?;
    let icon_file_name: Option<String> = row.get(12)?;
    let created_at = ts_at(row, 17)?;

    let icon = match icon_file_name {
        Some(file_name) => Some(AttachmentMeta {
            file_name,
            content_type: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
            file_size: row.get::<_, Option<i64>>(14)?.unwrap_or(0),
            updated_at: opt_ts_at(row, 15)?.unwrap_or(created_at),
        }),
        None => None,
    };

    Ok(Profile {
        id: ProfileId(row.get(0)?),
        user_id: row.get::<_, Option<i64>>(1)?.map(UserId),
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        location: row.get(5)?,
        time_zone: row.get(6)?,
        about_me: row.get(7)?,
        website: row.get(8)?,
        blog: row.get(9)?,
        flickr: row.get(10)?,
        is_active: is_active != 0,
        icon,
        last_activity_at: opt_ts_at(row, 16)?,
        created_at,
        updated_at: ts_at(row, 18)?,
    })
}
