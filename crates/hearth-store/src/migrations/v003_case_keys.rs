//! v003 -- Unicode case-folded uniqueness keys.
//!
//! `COLLATE NOCASE` only folds ASCII, so "ÜNAL@x.com" and "ünal@x.com"
//! slipped past it.  Each unique text column gets a companion `*_key`
//! column holding [`case_key`] of the value, with its own unique index.
//! SQLite has no full Unicode lowercase, so existing rows are backfilled
//! from Rust.

use hearth_shared::text::case_key;
use rusqlite::{params, Connection};

const ADD_COLUMNS_SQL: &str = r#"
ALTER TABLE users ADD COLUMN login_key TEXT;
ALTER TABLE profiles ADD COLUMN email_key TEXT;
"#;

const INDEX_SQL: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_login_key ON users(login_key);
CREATE UNIQUE INDEX IF NOT EXISTS idx_profiles_email_key ON profiles(email_key);
"#;

/// Apply the case-key migration.  Fails if existing rows already collide
/// once folded.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(ADD_COLUMNS_SQL)?;
    backfill(conn, "users", "login", "login_key")?;
    backfill(conn, "profiles", "email", "email_key")?;
    conn.execute_batch(INDEX_SQL)
}

fn backfill(
    conn: &Connection,
    table: &str,
    column: &str,
    key_column: &str,
) -> Result<(), rusqlite::Error> {
    let rows: Vec<(i64, String)> = {
        let mut stmt = conn.prepare(&format!("SELECT id, {column} FROM {table}"))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<_, _>>()?
    };

    let mut update =
        conn.prepare(&format!("UPDATE {table} SET {key_column} = ?1 WHERE id = ?2"))?;
    for (id, value) in &rows {
        update.execute(params![case_key(value), id])?;
    }
    if !rows.is_empty() {
        tracing::debug!(table, rows = rows.len(), "backfilled case keys");
    }
    Ok(())
}
