//! Private messages between profiles.

use hearth_shared::validation::{self, Validate};
use hearth_shared::{EntityKind, MessageId, ProfileId, RequestContext, RuleKind, ValidationErrors};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::{check_reference, Entity};
use crate::models::Message;
use crate::sql::{encode_ts, missing, ts_at};

/// Candidate for [`Database::send_message`].  The sender is the request's
/// current profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub receiver_id: Option<ProfileId>,
    pub subject: String,
    pub body: String,
}

impl Validate for NewMessage {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.receiver_id.is_none() {
            errors.add("receiver_id", RuleKind::Presence, validation::MSG_BLANK);
        }
        validation::presence(&mut errors, "body", Some(&self.body));
        errors
    }
}

impl Entity for Message {
    type Draft = NewMessage;
    const KIND: EntityKind = EntityKind::Message;
}

const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, subject, body, read, created_at";

impl Database {
    /// Send a message from `ctx.current_profile`.  The sender's account must
    /// be allowed to send messages.
    pub fn send_message(&self, ctx: &RequestContext, mut new: NewMessage) -> Result<Message> {
        new.subject = new.subject.trim().to_string();
        self.hooks().messages.validate(ctx, &mut new, |draft, errors| {
            match ctx.current_profile {
                Some(sender) => {
                    let allowed =
                        check_reference(errors, "sender_id", self.may_send_messages(sender))?;
                    if allowed == Some(false) {
                        errors.add(
                            "sender_id",
                            RuleKind::Invalid,
                            "is not allowed to send messages",
                        );
                    }
                }
                None => errors.add("sender_id", RuleKind::Presence, validation::MSG_BLANK),
            }
            if let Some(receiver) = draft.receiver_id {
                check_reference(errors, "receiver_id", self.get_profile(receiver))?;
            }
            Ok(())
        })?;

        self.conn().execute(
            "INSERT INTO messages (sender_id, receiver_id, subject, body, read, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                ctx.current_profile.map(|p| p.0),
                new.receiver_id.map(|p| p.0),
                new.subject,
                new.body,
                encode_ts(&ctx.now),
            ],
        )?;

        let message = self.get_message(MessageId(self.conn().last_insert_rowid()))?;
        tracing::info!(message_id = %message.id, "sent message");
        self.hooks().messages.committed(ctx, &message);
        Ok(message)
    }

    pub fn get_message(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.0],
                row_to_message,
            )
            .map_err(missing(EntityKind::Message, id.0))
    }

    /// Newest first.
    pub fn sent_messages(&self, sender: ProfileId) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE sender_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            sender,
        )
    }

    /// Newest first.
    pub fn received_messages(&self, receiver: ProfileId) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE receiver_id = ?1
                 ORDER BY created_at DESC, id DESC"
            ),
            receiver,
        )
    }

    pub fn unread_messages(&self, receiver: ProfileId) -> Result<Vec<Message>> {
        self.query_messages(
            &format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE receiver_id = ?1 AND read = 0
                 ORDER BY created_at DESC, id DESC"
            ),
            receiver,
        )
    }

    /// Marking an already-read message is a no-op.
    pub fn mark_message_read(&self, id: MessageId) -> Result<()> {
        let affected = self
            .conn()
            .execute("UPDATE messages SET read = 1 WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Message, id.0));
        }
        Ok(())
    }

    pub fn delete_message(&self, id: MessageId) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM messages WHERE id = ?1", params![id.0])?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::Message, id.0));
        }
        tracing::info!(message_id = %id, "deleted message");
        Ok(())
    }

    /// A profile may send when it is linked to a user whose
    /// `can_send_messages` flag is set.
    fn may_send_messages(&self, sender: ProfileId) -> Result<bool> {
        let profile = self.get_profile(sender)?;
        match profile.user_id {
            Some(user_id) => Ok(self.get_user(user_id)?.can_send_messages),
            None => Ok(false),
        }
    }

    fn query_messages(&self, sql: &str, profile: ProfileId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params![profile.0], row_to_message)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let read: i32 = row.get(5)?;
    Ok(Message {
        id: MessageId(row.get(0)?),
        sender_id: row.get::<_, Option<i64>>(1)?.map(ProfileId),
        receiver_id: row.get::<_, Option<i64>>(2)?.map(ProfileId),
        subject: row.get(3)?,
        body: row.get(4)?,
        read: read != 0,
        created_at: ts_at(row, 6)?,
    })
}
