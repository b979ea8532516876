//! Views derived from friend edges, comments and messages.
//!
//! Nothing here stores state of its own.  Friendship is directional per
//! edge: an accepted edge `a -> b` makes `b` a friend of `a`, not the other
//! way round.  A pending edge counts as a follow.

use hearth_shared::{FriendStatus, Page, Paginated, ProfileId};
use rand::Rng;
use rusqlite::params;

use crate::comments::{row_to_comment, COMMENT_COLUMNS};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Comment, Profile};
use crate::profiles::{row_to_profile, PROFILE_COLUMNS};

/// Comments on `?1`'s wall by `?2` and on `?2`'s wall by `?1`.
const BETWEEN_WHERE: &str = "(c.commentable_type = 'Profile' AND c.commentable_id = ?1 AND c.profile_id = ?2)
     OR (c.commentable_type = 'Profile' AND c.commentable_id = ?2 AND c.profile_id = ?1)";

/// Active with a bio, owned by a user that still exists.
const FEATURED_WHERE: &str = "p.is_active = 1
     AND p.about_me IS NOT NULL AND TRIM(p.about_me) <> ''
     AND EXISTS (SELECT 1 FROM users u WHERE u.id = p.user_id)";

impl Database {
    // ------------------------------------------------------------------
    // Friend edges
    // ------------------------------------------------------------------

    /// Profiles `profile` has an accepted edge to.
    pub fn friends_of(&self, profile: ProfileId) -> Result<Vec<Profile>> {
        self.edge_targets(
            "JOIN friends f ON f.invited_id = p.id WHERE f.inviter_id = ?1 AND f.status = ?2",
            profile,
            FriendStatus::Accepted,
        )
    }

    /// Profiles with a pending edge to `profile`.
    pub fn followers_of(&self, profile: ProfileId) -> Result<Vec<Profile>> {
        self.edge_targets(
            "JOIN friends f ON f.inviter_id = p.id WHERE f.invited_id = ?1 AND f.status = ?2",
            profile,
            FriendStatus::Pending,
        )
    }

    /// Profiles `profile` has a pending edge to.
    pub fn followings_of(&self, profile: ProfileId) -> Result<Vec<Profile>> {
        self.edge_targets(
            "JOIN friends f ON f.invited_id = p.id WHERE f.inviter_id = ?1 AND f.status = ?2",
            profile,
            FriendStatus::Pending,
        )
    }

    /// True when any edge, pending or accepted, touches `profile`.
    pub fn has_network(&self, profile: ProfileId) -> Result<bool> {
        let found = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM friends WHERE inviter_id = ?1 OR invited_id = ?1)",
            params![profile.0],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    /// `other` is among `profile`'s friends.
    pub fn is_friend_of(&self, profile: ProfileId, other: ProfileId) -> Result<bool> {
        self.edge_exists(profile, other, FriendStatus::Accepted)
    }

    /// `other` follows `profile`.
    pub fn is_followed_by(&self, profile: ProfileId, other: ProfileId) -> Result<bool> {
        self.edge_exists(other, profile, FriendStatus::Pending)
    }

    /// `profile` follows `other`.
    pub fn is_following(&self, profile: ProfileId, other: ProfileId) -> Result<bool> {
        self.edge_exists(profile, other, FriendStatus::Pending)
    }

    fn edge_targets(
        &self,
        join_where: &str,
        profile: ProfileId,
        status: FriendStatus,
    ) -> Result<Vec<Profile>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p {join_where}
             ORDER BY f.created_at ASC, f.id ASC"
        ))?;
        let rows = stmt.query_map(params![profile.0, status.as_i64()], row_to_profile)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    fn edge_exists(
        &self,
        inviter: ProfileId,
        invited: ProfileId,
        status: FriendStatus,
    ) -> Result<bool> {
        let found = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM friends
                           WHERE inviter_id = ?1 AND invited_id = ?2 AND status = ?3)",
            params![inviter.0, invited.0, status.as_i64()],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Walls
    // ------------------------------------------------------------------

    /// The wall-to-wall thread between two profiles, newest first.  The
    /// result does not depend on argument order.
    pub fn comments_between(&self, a: ProfileId, b: ProfileId) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c
             WHERE {BETWEEN_WHERE}
             ORDER BY c.created_at DESC, c.id DESC"
        ))?;
        let rows = stmt.query_map(params![a.0, b.0], row_to_comment)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    pub fn comments_between_page(
        &self,
        a: ProfileId,
        b: ProfileId,
        page: Page,
    ) -> Result<Paginated<Comment>> {
        let total: i64 = self.conn().query_row(
            &format!("SELECT COUNT(*) FROM comments c WHERE {BETWEEN_WHERE}"),
            params![a.0, b.0],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c
             WHERE {BETWEEN_WHERE}
             ORDER BY c.created_at DESC, c.id DESC
             LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt.query_map(
            params![a.0, b.0, page.limit(), page.offset()],
            row_to_comment,
        )?;
        let items = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Paginated::new(items, page, total as u64))
    }

    /// Whether `a` and `b` have written on each other's walls.  Always false
    /// without a second profile.
    pub fn has_wall_with(&self, a: ProfileId, b: Option<ProfileId>) -> Result<bool> {
        let Some(b) = b else {
            return Ok(false);
        };
        let found = self.conn().query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM comments c WHERE {BETWEEN_WHERE})"),
            params![a.0, b.0],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub fn unread_message_count(&self, profile: ProfileId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
            params![profile.0],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Featured
    // ------------------------------------------------------------------

    /// A uniformly chosen profile worth featuring, if any qualifies.
    pub fn featured_profile(&self) -> Result<Option<Profile>> {
        self.featured_profile_with(&mut rand::thread_rng())
    }

    /// [`Database::featured_profile`] with a caller-supplied random source.
    /// The count and the fetch see the same snapshot.
    pub fn featured_profile_with<R: Rng>(&self, rng: &mut R) -> Result<Option<Profile>> {
        let tx = self.conn().unchecked_transaction()?;

        let count: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM profiles p WHERE {FEATURED_WHERE}"),
            [],
            |row| row.get(0),
        )?;
        if count == 0 {
            tx.commit()?;
            return Ok(None);
        }

        let offset = rng.gen_range(0..count);
        let profile = tx.query_row(
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles p
                 WHERE {FEATURED_WHERE}
                 ORDER BY p.id
                 LIMIT 1 OFFSET ?1"
            ),
            params![offset],
            row_to_profile,
        )?;
        tx.commit()?;

        tracing::debug!(profile_id = %profile.id, candidates = count, "picked featured profile");
        Ok(Some(profile))
    }
}
