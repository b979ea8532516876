//! Friend edges.  An edge is directed from inviter to invited and starts out
//! pending; accepting it is the only transition.

use hearth_shared::{
    EntityKind, FriendId, FriendStatus, ProfileId, RequestContext, RuleKind, ValidationErrors,
};
use rusqlite::{params, OptionalExtension};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::check_reference;
use crate::models::Friend;
use crate::sql::{conversion_error, encode_ts, missing, ts_at, unique_or_sqlite};

const FRIEND_COLUMNS: &str = "id, inviter_id, invited_id, status, created_at, updated_at";

impl Database {
    /// Create a pending edge `inviter -> invited`.
    pub fn request_friendship(
        &self,
        ctx: &RequestContext,
        inviter: ProfileId,
        invited: ProfileId,
    ) -> Result<Friend> {
        let mut errors = ValidationErrors::new();
        if inviter == invited {
            errors.add("invited_id", RuleKind::Invalid, "can't be the inviter");
        }
        check_reference(&mut errors, "inviter_id", self.get_profile(inviter))?;
        check_reference(&mut errors, "invited_id", self.get_profile(invited))?;
        if self.find_friendship(inviter, invited)?.is_some() {
            errors.add("invited_id", RuleKind::Uniqueness, "has already been invited");
        }
        errors.into_result()?;

        let now = encode_ts(&ctx.now);
        self.conn()
            .execute(
                "INSERT INTO friends (inviter_id, invited_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![inviter.0, invited.0, FriendStatus::Pending.as_i64(), now],
            )
            .map_err(|e| unique_or_sqlite(e, "friends.inviter_id", "invited_id"))?;

        let friend = self.get_friendship(FriendId(self.conn().last_insert_rowid()))?;
        tracing::info!(friend_id = %friend.id, %inviter, %invited, "requested friendship");
        Ok(friend)
    }

    /// Move a pending edge to accepted.  Accepting an edge twice is an error.
    pub fn accept_friendship(&self, ctx: &RequestContext, id: FriendId) -> Result<Friend> {
        let edge = self.get_friendship(id)?;
        if !edge.status.can_become(FriendStatus::Accepted) {
            return Err(StoreError::InvalidTransition {
                from: edge.status,
                to: FriendStatus::Accepted,
            });
        }

        self.conn().execute(
            "UPDATE friends SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![FriendStatus::Accepted.as_i64(), encode_ts(&ctx.now), id.0],
        )?;

        tracing::info!(friend_id = %id, "accepted friendship");
        self.get_friendship(id)
    }

    pub fn get_friendship(&self, id: FriendId) -> Result<Friend> {
        self.conn()
            .query_row(
                &format!("SELECT {FRIEND_COLUMNS} FROM friends WHERE id = ?1"),
                params![id.0],
                row_to_friend,
            )
            .map_err(missing(EntityKind::Friend, id.0))
    }

    /// The edge `inviter -> invited`, if any.  The reverse edge is not
    /// considered.
    pub fn find_friendship(&self, inviter: ProfileId, invited: ProfileId) -> Result<Option<Friend>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {FRIEND_COLUMNS} FROM friends WHERE inviter_id = ?1 AND invited_id = ?2"
                ),
                params![inviter.0, invited.0],
                row_to_friend,
            )
            .optional()
            .map_err(StoreError::Sqlite)
    }

    pub fn delete_friendship(&self, id: FriendId) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM friends WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Friend, id.0));
        }
        tracing::info!(friend_id = %id, "deleted friendship");
        Ok(())
    }
}

fn row_to_friend(row: &rusqlite::Row<'_>) -> rusqlite::Result<Friend> {
    let raw_status: i64 = row.get(3)?;
    let status = FriendStatus::from_i64(raw_status)
        .ok_or_else(|| conversion_error(3, format!("unknown friend status {raw_status}")))?;
    Ok(Friend {
        id: FriendId(row.get(0)?),
        inviter_id: ProfileId(row.get(1)?),
        invited_id: ProfileId(row.get(2)?),
        status,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}
