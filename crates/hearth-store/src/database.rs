//! Database connection management.
//!
//! The [`Database`] struct owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation.  It also carries the
//! cascade policy used by deletes and the lifecycle hooks run around writes.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use rusqlite::Connection;

use crate::cascade::CascadePolicy;
use crate::error::{Result, StoreError};
use crate::hooks::HookRegistry;
use crate::migrations;

/// Wrapper around a [`rusqlite::Connection`].
pub struct Database {
    conn: Connection,
    policy: CascadePolicy,
    hooks: HookRegistry,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/hearth/hearth.db`
    /// - macOS:   `~/Library/Application Support/org.hearth.hearth/hearth.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\hearth\hearth\data\hearth.db`
    pub fn new() -> Result<Self> {
        let path = default_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn,
            policy: CascadePolicy::default(),
            hooks: HookRegistry::default(),
        })
    }

    /// Replace the cascade policy.  The policy is validated first.
    pub fn with_cascade_policy(mut self, policy: CascadePolicy) -> Result<Self> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn cascade_policy(&self) -> &CascadePolicy {
        &self.policy
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Register additional lifecycle hooks.
    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Return a reference to the underlying `rusqlite::Connection`.
    ///
    /// Callers should prefer the typed CRUD helpers, but direct access is
    /// occasionally needed for ad-hoc queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn.path().map(PathBuf::from)
    }
}

/// Platform data directory location of `hearth.db`.
pub fn default_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("org", "hearth", "hearth").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join("hearth.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{DeleteRule, Relation};

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = Database::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        drop(db);

        // Reopening an existing file must not re-run migrations.
        Database::open_at(&path).expect("should reopen");
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();
        let on: i64 = db
            .conn()
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(on, 1);
    }

    #[test]
    fn custom_policy_is_installed() {
        let mut policy = CascadePolicy::default();
        policy
            .set(Relation::ProfileBlogs, DeleteRule::Cascade)
            .unwrap();
        let db = Database::open_in_memory()
            .unwrap()
            .with_cascade_policy(policy)
            .unwrap();
        assert_eq!(
            db.cascade_policy().rule(Relation::ProfileBlogs),
            DeleteRule::Cascade
        );
    }
}
