//! CRUD operations for [`User`] records.

use hearth_shared::text::case_key;
use hearth_shared::validation::{self, Validate, MSG_TAKEN};
use hearth_shared::{EntityKind, ProfileId, RequestContext, RuleKind, UserId, ValidationErrors};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::cascade::{self, DeleteRule, Relation};
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::hooks::Entity;
use crate::models::User;
use crate::sql::{encode_ts, missing, ts_at, unique_or_sqlite};

/// Candidate for [`Database::create_user`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewUser {
    pub login: String,
    pub crypted_password: Option<String>,
    pub salt: Option<String>,
}

impl Validate for NewUser {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validation::login(&mut errors, "login", &self.login);
        errors
    }
}

impl Entity for User {
    type Draft = NewUser;
    const KIND: EntityKind = EntityKind::User;
}

const USER_COLUMNS: &str = "id, login, crypted_password, salt, can_send_messages, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    pub fn create_user(&self, ctx: &RequestContext, mut new: NewUser) -> Result<User> {
        new.login = new.login.trim().to_string();
        self.hooks().users.validate(ctx, &mut new, |draft, errors| {
            self.check_login_unique(&draft.login, errors)
        })?;

        self.conn()
            .execute(
                "INSERT INTO users (login, login_key, crypted_password, salt, can_send_messages,
                                    created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    new.login,
                    case_key(&new.login),
                    new.crypted_password,
                    new.salt,
                    encode_ts(&ctx.now)
                ],
            )
            .map_err(|e| unique_or_sqlite(e, "users.login", "login"))?;

        let user = self.get_user(UserId(self.conn().last_insert_rowid()))?;
        tracing::info!(user_id = %user.id, login = %user.login, "created user");
        self.hooks().users.committed(ctx, &user);
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_user(&self, id: UserId) -> Result<User> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.0],
                row_to_user,
            )
            .map_err(missing(EntityKind::User, id.0))
    }

    /// Case-insensitive lookup, Unicode included.
    pub fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE login_key = ?1"))?;
        let mut rows = stmt.query_map(params![case_key(login)], row_to_user)?;
        rows.next().transpose().map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    pub fn set_can_send_messages(&self, id: UserId, allowed: bool) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET can_send_messages = ?1 WHERE id = ?2",
            params![allowed as i32, id.0],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(EntityKind::User, id.0));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a user.  The owned profile follows the `user_profile` rule;
    /// when that rule cascades, the profile's own dependents follow theirs.
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;
        self.get_user(id)?;

        if self.cascade_policy().rule(Relation::UserProfile) == DeleteRule::Cascade {
            let owned: Option<i64> = tx
                .query_row(
                    "SELECT id FROM profiles WHERE user_id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(profile_id) = owned {
                self.resolve_profile_dependents(ProfileId(profile_id))?;
            }
        }
        cascade::resolve(&tx, self.cascade_policy(), Relation::UserProfile, id.0)?;

        tx.execute("DELETE FROM users WHERE id = ?1", params![id.0])?;
        tx.commit()?;

        tracing::info!(user_id = %id, "deleted user");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Rules
    // ------------------------------------------------------------------

    fn check_login_unique(&self, login: &str, errors: &mut ValidationErrors) -> Result<()> {
        if login.is_empty() {
            return Ok(());
        }
        let taken: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE login_key = ?1)",
            params![case_key(login)],
            |row| row.get(0),
        )?;
        if taken {
            errors.add("login", RuleKind::Uniqueness, MSG_TAKEN);
        }
        Ok(())
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let can_send: i32 = row.get(4)?;
    Ok(User {
        id: UserId(row.get(0)?),
        login: row.get(1)?,
        crypted_password: row.get(2)?,
        salt: row.get(3)?,
        can_send_messages: can_send != 0,
        created_at: ts_at(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(login: &str) -> NewUser {
        NewUser {
            login: login.to_string(),
            ..NewUser::default()
        }
    }

    #[test]
    fn login_is_unique_ignoring_case() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::anonymous();
        db.create_user(&ctx, new_user("alice")).unwrap();

        let err = db.create_user(&ctx, new_user("ALICE")).unwrap_err();
        assert!(err.validation().unwrap().has("login", RuleKind::Uniqueness));

        let found = db.get_user_by_login("Alice").unwrap().unwrap();
        assert_eq!(found.login, "alice");
        assert!(found.can_send_messages);
    }

    #[test]
    fn non_ascii_login_is_unique_ignoring_case() {
        let db = Database::open_in_memory().unwrap();
        let ctx = RequestContext::anonymous();
        db.create_user(&ctx, new_user("Ümit")).unwrap();

        let err = db.create_user(&ctx, new_user("üMIT")).unwrap_err();
        assert!(err.validation().unwrap().has("login", RuleKind::Uniqueness));
        assert_eq!(db.get_user_by_login("ÜMIT").unwrap().unwrap().login, "Ümit");

        // The schema holds the line even without the pre-check.
        let err = db
            .conn()
            .execute(
                "INSERT INTO users (login, login_key, created_at)
                 VALUES ('ÜMIT', 'ümit', '2008-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap_err();
        assert!(matches!(
            unique_or_sqlite(err, "users.login", "login"),
            StoreError::Validation(_)
        ));
    }

    #[test]
    fn blank_login_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_user(&RequestContext::anonymous(), new_user("  "))
            .unwrap_err();
        assert!(err.validation().unwrap().has("login", RuleKind::Presence));
    }

    #[test]
    fn missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_user(UserId(42)).unwrap_err().is_not_found());
        assert!(db.set_can_send_messages(UserId(42), false).unwrap_err().is_not_found());
        assert!(db.delete_user(UserId(42)).unwrap_err().is_not_found());
    }
}
